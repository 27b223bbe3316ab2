//! Owner-existence lookups.
//!
//! Identity lives outside this crate; the services only ask whether an owner
//! id is known before creating a challenge for it.

use std::collections::HashSet;

/// Answers whether an owner id refers to a known user.
pub trait UserDirectory: Send + Sync {
    fn exists(&self, owner_id: &str) -> bool;
}

/// Accepts any non-blank owner id.
///
/// Used by the CLI, where the operator names the owner directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

impl UserDirectory for OpenDirectory {
    fn exists(&self, owner_id: &str) -> bool {
        !owner_id.trim().is_empty()
    }
}

/// A fixed set of known owners.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    owners: HashSet<String>,
}

impl StaticDirectory {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

impl UserDirectory for StaticDirectory {
    fn exists(&self, owner_id: &str) -> bool {
        self.owners.contains(owner_id)
    }
}
