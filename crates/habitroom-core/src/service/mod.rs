//! Wall-clock challenge service.
//!
//! Every public operation runs in one [`ChallengeDb::transaction`]: it reads
//! what it needs, validates completely, then writes. Aggregate changes go
//! through an [`AggregationStrategy`] (push-delta by default), so a lost race
//! on the progress row surfaces as `CONFLICT` and rolls the whole operation
//! back. Nothing here retries.

mod batch;
mod completion;
mod extension;
mod lifecycle;
pub mod views;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::challenge::{Challenge, ChallengeMode};
use crate::cheer::{CheerMessages, DefaultCheers};
use crate::clock::{Clock, SystemClock};
use crate::directory::{OpenDirectory, UserDirectory};
use crate::error::{CoreError, Result, ValidationError};
use crate::progress::{AggregationStrategy, PushDelta};
use crate::storage::{ChallengeDb, LimitsConfig};

pub use lifecycle::{active_detail, create_in_mode, ChallengeRequest};
pub use views::{
    BatchItem, BatchResult, ChallengeDetail, ChallengeSummary, CreatedChallengeView, DayAdvance,
    ExtensionResult, FinishedChallenge, RoutineView, ToggleResult,
};

/// Collaborators shared by both challenge services.
#[derive(Clone)]
pub struct ServiceContext {
    pub clock: Arc<dyn Clock>,
    pub directory: Arc<dyn UserDirectory>,
    pub cheers: Arc<dyn CheerMessages>,
    pub limits: LimitsConfig,
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            directory: Arc::new(OpenDirectory),
            cheers: Arc::new(DefaultCheers),
            limits: LimitsConfig::default(),
        }
    }
}

impl ServiceContext {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_cheers(mut self, cheers: Arc<dyn CheerMessages>) -> Self {
        self.cheers = cheers;
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

/// Fails unless `challenge` runs in `mode`.
///
/// Each service only mutates challenges of its own mode so the two
/// aggregation strategies never touch the same aggregate.
pub(crate) fn require_mode(challenge: &Challenge, mode: ChallengeMode) -> Result<()> {
    if challenge.mode == mode {
        return Ok(());
    }
    Err(ValidationError::InvalidValue {
        field: "challenge".to_string(),
        message: format!(
            "challenge {} is a {} challenge, expected {}",
            challenge.id,
            challenge.mode.as_str(),
            mode.as_str()
        ),
    }
    .into())
}

/// Challenge operations that take "today" from the injected clock.
pub struct ChallengeService {
    db: ChallengeDb,
    ctx: ServiceContext,
    strategy: Box<dyn AggregationStrategy>,
}

impl ChallengeService {
    pub fn new(db: ChallengeDb, ctx: ServiceContext) -> Self {
        Self {
            db,
            ctx,
            strategy: Box::new(PushDelta),
        }
    }

    /// Swap the aggregation strategy (push-delta by default).
    pub fn with_strategy(mut self, strategy: Box<dyn AggregationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn db(&self) -> &ChallengeDb {
        &self.db
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    fn active_challenge(
        &self,
        owner_id: &str,
    ) -> Result<(Challenge, crate::progress::ProgressAggregate)> {
        self.db
            .find_active_challenge(owner_id)?
            .ok_or_else(|| CoreError::not_found("active challenge", owner_id))
    }
}
