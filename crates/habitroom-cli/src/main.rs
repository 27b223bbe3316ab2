use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Session;

#[derive(Parser)]
#[command(name = "habitroom-cli", version, about = "Habitroom CLI")]
struct Cli {
    /// Owner the command acts for
    #[arg(long, global = true, env = "HABITROOM_OWNER")]
    owner: Option<String>,
    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true, env = "HABITROOM_TODAY")]
    today: Option<chrono::NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wall-clock challenges
    Challenge {
        #[command(subcommand)]
        action: commands::challenge::ChallengeAction,
    },
    /// Routine completion and custom routines
    Routine {
        #[command(subcommand)]
        action: commands::routine::RoutineAction,
    },
    /// Simulated-time challenges
    Sim {
        #[command(subcommand)]
        action: commands::sim::SimAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Owner ids
    Owner {
        #[command(subcommand)]
        action: commands::owner::OwnerAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HABITROOM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let session = Session::new(cli.owner, cli.today);
    let result = match cli.command {
        Commands::Challenge { action } => commands::challenge::run(&session, action),
        Commands::Routine { action } => commands::routine::run(&session, action),
        Commands::Sim { action } => commands::sim::run(&session, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Owner { action } => commands::owner::run(action),
    };

    if let Err(e) = result {
        commands::report_error(e.as_ref());
        std::process::exit(1);
    }
}
