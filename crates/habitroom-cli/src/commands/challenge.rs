//! Wall-clock challenge commands.

use clap::Subcommand;

use super::{print_json, CmdResult, Session};

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Start a seven-day challenge today
    Create {
        /// Challenge title
        title: String,
        /// Category id (1 health, 2 study, 3 mindfulness, 4 productivity, 5 lifestyle)
        #[arg(long, default_value = "1")]
        category: u32,
        /// Routine name; repeat for up to three routines
        #[arg(long = "routine", required = true)]
        routines: Vec<String>,
    },
    /// Show the active challenge
    Show,
    /// List every routine of the active challenge
    Routines,
    /// List all challenges of the owner, newest first
    History,
    /// Finish the active challenge
    Finish,
}

pub fn run(session: &Session, action: ChallengeAction) -> CmdResult {
    let owner = session.owner()?;
    match action {
        ChallengeAction::Create {
            title,
            category,
            routines,
        } => {
            let service = session.service()?;
            let created = service.create_challenge(owner, category, &title, &routines)?;
            print_json(&created)?;
        }
        ChallengeAction::Show => {
            let detail = session.service()?.get_active_challenge_detail(owner)?;
            print_json(&detail)?;
        }
        ChallengeAction::Routines => {
            let routines = session.service()?.list_active_routines(owner)?;
            print_json(&routines)?;
        }
        ChallengeAction::History => {
            let history = session.service()?.challenge_history(owner)?;
            print_json(&history)?;
        }
        ChallengeAction::Finish => {
            let finished = session.service()?.finish_challenge(owner)?;
            print_json(&finished)?;
        }
    }
    Ok(())
}
