use clap::Subcommand;
use uuid::Uuid;

use super::CmdResult;

#[derive(Subcommand)]
pub enum OwnerAction {
    /// Print a fresh owner id to use with --owner
    New,
}

pub fn run(action: OwnerAction) -> CmdResult {
    match action {
        OwnerAction::New => println!("{}", Uuid::new_v4()),
    }
    Ok(())
}
