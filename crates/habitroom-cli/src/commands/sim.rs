//! Simulated-time challenge commands.

use clap::Subcommand;

use super::{print_json, CmdResult, Session};

#[derive(Subcommand)]
pub enum SimAction {
    /// Start a simulated challenge with its cursor on today
    Start {
        /// Challenge title
        title: String,
        /// Category id (1-5)
        #[arg(long, default_value = "1")]
        category: u32,
        /// Routine name; repeat for up to three routines
        #[arg(long = "routine", required = true)]
        routines: Vec<String>,
    },
    /// Show the simulated challenge as of its cursor
    Show,
    /// Flip one routine and recount progress
    Toggle {
        /// Routine ID
        id: i64,
    },
    /// Move the cursor forward one day
    Advance,
    /// Recount completed routines of a challenge
    Recalc {
        /// Challenge ID
        challenge_id: i64,
    },
}

pub fn run(session: &Session, action: SimAction) -> CmdResult {
    let service = session.simulated()?;
    match action {
        SimAction::Start {
            title,
            category,
            routines,
        } => {
            let created = service.start_challenge(session.owner()?, category, &title, &routines)?;
            print_json(&created)?;
        }
        SimAction::Show => print_json(&service.detail(session.owner()?)?)?,
        SimAction::Toggle { id } => print_json(&service.toggle_routine(session.owner()?, id)?)?,
        SimAction::Advance => print_json(&service.advance_day(session.owner()?)?)?,
        SimAction::Recalc { challenge_id } => {
            print_json(&service.recalculate_statistics(challenge_id)?)?;
        }
    }
    Ok(())
}
