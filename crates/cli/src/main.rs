//! Prowl CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — Run one conversational turn against the agent
//! - `task`   — Manage proactive scheduled tasks
//! - `daemon` — Start the full proactive runtime

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "prowl",
    about = "Prowl — a steerable agent runtime with proactive scheduled tasks",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (one turn per invocation)
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Session id to continue; a new session is created if omitted
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage proactive tasks
    Task {
        #[command(subcommand)]
        command: commands::task::TaskCommands,
    },

    /// Start the full proactive runtime (agent + scheduler + watcher)
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message, session } => commands::chat::run(message, session).await?,
        Commands::Task { command } => commands::task::run(command).await?,
        Commands::Daemon => commands::daemon::run().await?,
    }

    Ok(())
}
