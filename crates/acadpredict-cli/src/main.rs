mod app;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Parser, Debug)]
#[command(
    name = "acadpredict",
    version,
    about = "Sign in to the academic prediction service and query it"
)]
struct Cli {
    /// Service base URL, overriding the config file and ACADPREDICT_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Sign in (asks for the password)
    Login {
        /// Institutional email; defaults to the last one used
        email: Option<String>,
        /// Keep the session and store the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Create an institutional account
    Register,
    /// Sign out
    Logout {
        /// Also drop the stored password
        #[arg(long)]
        forget: bool,
    },
    /// Show the current session and login lock
    Status,
    /// Show the login lock
    LockStatus {
        /// Count down until the lock lifts
        #[arg(long)]
        watch: bool,
    },
    /// Show service statistics
    Stats,
    /// Show your prediction history
    History,
    /// Check that the service is reachable
    Health,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();
    info!(command = ?cli.command, "acadpredict starting");

    let mut app = App::new(cli.api_url)?;

    match cli.command {
        Command::Login { email, remember } => app.login(email, remember).await,
        Command::Register => app.register().await,
        Command::Logout { forget } => app.logout(forget),
        Command::Status => {
            app.status();
            Ok(())
        }
        Command::LockStatus { watch } => app.lock_status(watch).await,
        Command::Stats => app.stats().await,
        Command::History => app.history().await,
        Command::Health => app.health().await,
    }
}
