//! Routine completion commands.

use clap::Subcommand;
use habitroom_core::{BatchItem, CoreError, ValidationError};

use super::{print_json, CmdResult, Session};

#[derive(Subcommand)]
pub enum RoutineAction {
    /// Flip one routine between done and not done
    Toggle {
        /// Routine ID
        id: i64,
    },
    /// Set several routines at once, all or nothing
    Update {
        /// JSON array, e.g. '[{"routine_id": 1, "complete": true}]'
        items: String,
    },
    /// Add a custom routine to every remaining day
    Add {
        /// Routine name
        name: String,
    },
}

pub fn run(session: &Session, action: RoutineAction) -> CmdResult {
    let owner = session.owner()?;
    let service = session.service()?;
    match action {
        RoutineAction::Toggle { id } => {
            print_json(&service.toggle_routine(owner, id)?)?;
        }
        RoutineAction::Update { items } => {
            let items: Vec<BatchItem> = serde_json::from_str(&items).map_err(|e| {
                CoreError::from(ValidationError::InvalidValue {
                    field: "items".to_string(),
                    message: e.to_string(),
                })
            })?;
            print_json(&service.update_many(owner, &items)?)?;
        }
        RoutineAction::Add { name } => {
            print_json(&service.add_custom_routine(owner, &name)?)?;
        }
    }
    Ok(())
}
