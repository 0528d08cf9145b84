//! Taskline CLI - personal tasks in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use taskline_core::services::LogEvent;
use taskline_core::TaskFilter;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{auth, config, logs, task};

/// Taskline - personal tasks in your terminal
#[derive(Parser)]
#[command(name = "tk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sign in with an existing account
    Login {
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sign out
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Request a password reset email
    ResetPassword {
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the signed-in account
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Optional longer description
        #[arg(short, long)]
        description: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tasks, newest first
    List {
        /// Which tasks to show: all, active, completed
        /// (defaults to app.defaultFilter in settings.json)
        #[arg(short, long)]
        filter: Option<TaskFilter>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a task completed, or active again
    Toggle {
        /// Task ID (any unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change a task's title or description
    Edit {
        /// Task ID (any unique prefix)
        id: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New description
        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description
        #[arg(long)]
        clear_description: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a task
    Rm {
        /// Task ID (any unique prefix)
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// View or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

impl Commands {
    /// Command name as recorded in the event log
    fn name(&self) -> &'static str {
        match self {
            Commands::Register { .. } => "register",
            Commands::Login { .. } => "login",
            Commands::Logout { .. } => "logout",
            Commands::ResetPassword { .. } => "reset-password",
            Commands::Whoami { .. } => "whoami",
            Commands::Add { .. } => "add",
            Commands::List { .. } => "list",
            Commands::Toggle { .. } => "toggle",
            Commands::Edit { .. } => "edit",
            Commands::Rm { .. } => "rm",
            Commands::Logs { .. } => "logs",
            Commands::Config { .. } => "config",
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let command = cli.command.name();

    commands::record(LogEvent::new("command_executed").with_command(command));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::record(
                LogEvent::new("command_failed")
                    .with_command(command)
                    .with_error(e.to_string())
                    .with_error_details(format!("{:#}", e)),
            );
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register { email, json } => auth::register(&email, json).await,
        Commands::Login { email, json } => auth::login(&email, json).await,
        Commands::Logout { json } => auth::logout(json).await,
        Commands::ResetPassword { email, json } => auth::reset_password(&email, json).await,
        Commands::Whoami { json } => auth::whoami(json).await,
        Commands::Add {
            title,
            description,
            json,
        } => task::add(&title, description.as_deref(), json).await,
        Commands::List { filter, json } => task::list(filter, json).await,
        Commands::Toggle { id, json } => task::toggle(&id, json).await,
        Commands::Edit {
            id,
            title,
            description,
            clear_description,
            json,
        } => task::edit(&id, title, description, clear_description, json).await,
        Commands::Rm { id, force, json } => task::remove(&id, force, json).await,
        Commands::Logs { command } => logs::run(command),
        Commands::Config { command } => config::run(command),
    }
}
