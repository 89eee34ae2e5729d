//! Sessync CLI
//!
//! Command-line tools for a local sessions directory and a directory remote.
//!
//! # Commands
//!
//! - `list` - List local sessions
//! - `new` - Create an empty session
//! - `rename` - Rename a session
//! - `delete` - Delete a session, leaving a tombstone for the next sync
//! - `plan` - Show the actions the next sync pass would run
//! - `sync` - Synchronize with the remote until converged

mod commands;
mod context;

use clap::{Parser, Subcommand};
use context::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Session synchronization tools.
#[derive(Parser)]
#[command(name = "sessync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local sessions directory
    #[arg(global = true, short, long, default_value = "sessions")]
    sessions_dir: PathBuf,

    /// Path to the remote directory
    #[arg(global = true, short, long)]
    remote_dir: Option<PathBuf>,

    /// Remote project to synchronize with
    #[arg(global = true, short, long, default_value = "default")]
    project: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List local sessions, most recently modified first
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create an empty session
    New {
        /// Session name
        name: String,
    },

    /// Rename a session
    Rename {
        /// Session id
        id: Uuid,
        /// New name
        name: String,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: Uuid,
    },

    /// Show the actions the next sync pass would run
    Plan {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Synchronize with the remote
    Sync {
        /// Maximum number of plan/execute iterations
        #[arg(short = 'n', long)]
        max_iterations: Option<u32>,

        /// Upload local sessions without merging remote changes first
        #[arg(long)]
        no_merge: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let ctx = Context::new(cli.sessions_dir, cli.remote_dir, cli.project);

    match cli.command {
        Commands::List { format } => commands::list::run(&ctx, &format)?,
        Commands::New { name } => commands::edit::create(&ctx, &name)?,
        Commands::Rename { id, name } => commands::edit::rename(&ctx, id, &name)?,
        Commands::Delete { id } => commands::edit::delete(&ctx, id)?,
        Commands::Plan { format } => commands::plan::run(&ctx, &format)?,
        Commands::Sync {
            max_iterations,
            no_merge,
        } => commands::sync::run(&ctx, max_iterations, !no_merge)?,
        Commands::Version => {
            println!("sessync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
