//! fluenthour - guided one-hour speaking practice
//!
//! Picks a speaking session from plain-text libraries, runs it phase by
//! phase with a countdown, and tracks practice hours toward a goal.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/fluenthour/progress.db (~/.local/share/fluenthour/progress.db)
//! - Logs: $XDG_STATE_HOME/fluenthour/ (~/.local/state/fluenthour/)
//! - Config: $XDG_CONFIG_HOME/fluenthour/config.toml (~/.config/fluenthour/config.toml)

mod commands;
mod context;
mod process_lock;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fluenthour_core::{Config, Level, PhaseBoundary, SelectionMode};
use std::path::PathBuf;

use crate::context::AppContext;

#[derive(Parser)]
#[command(name = "fluenthour")]
#[command(about = "Guided one-hour speaking practice sessions")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    library: LibraryArgs,

    /// Runs the next session when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

/// Library options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct LibraryArgs {
    /// Extra library files (glob pattern); these win over configured sources
    #[arg(short = 'L', long = "library", value_name = "GLOB", global = true)]
    pub library: Vec<String>,

    /// Leave out the bundled starter library
    #[arg(long, global = true)]
    pub no_starter: bool,
}

/// How to choose a session.
#[derive(Args, Debug, Clone, Default)]
pub struct PickArgs {
    /// Level to practise (defaults to the last level used)
    #[arg(short, long)]
    pub level: Option<Level>,

    /// Selection mode: random or path
    #[arg(short, long)]
    pub mode: Option<SelectionMode>,

    /// Prefer sessions in this category (random mode only)
    #[arg(short, long)]
    pub category: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List sessions in the catalog
    List {
        /// Only sessions at this level
        #[arg(short, long)]
        level: Option<Level>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show every detail of one session
    Show {
        /// Session id
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Parse library files and report blocks that did not load
    Check {
        /// Files to check (defaults to every configured source)
        files: Vec<PathBuf>,
    },

    /// Import library text from a file, or stdin when no file is given
    Import {
        file: Option<PathBuf>,
    },

    /// List imported texts, or remove one
    Imports {
        /// Remove the import whose hash starts with this prefix
        #[arg(long, value_name = "HASH")]
        remove: Option<String>,
    },

    /// Pick the next session without starting it
    Next {
        #[command(flatten)]
        pick: PickArgs,
    },

    /// Run a session interactively
    Run {
        /// Session id (picked automatically when omitted)
        id: Option<String>,

        #[command(flatten)]
        pick: PickArgs,

        /// What happens when a phase ends: autopause or auto-continue
        #[arg(short, long)]
        boundary: Option<PhaseBoundary>,

        /// Print the phase plan and exit without starting the timer
        #[arg(long)]
        dry_run: bool,
    },

    /// Mark a session complete without running it
    Complete {
        /// Session id
        id: String,
    },

    /// Show practice hours and per-level progress
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print a prompt to paste into an AI chat
    Prompt {
        #[command(subcommand)]
        kind: PromptKind,
    },

    /// Clear stored progress
    Reset {
        /// Only clear completions at this level
        #[arg(short, long)]
        level: Option<Level>,

        /// Also clear recent-selection history
        #[arg(long)]
        history: bool,

        /// Also clear logged practice time
        #[arg(long)]
        practice: bool,

        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PromptKind {
    /// Ask an AI to write new sessions in the library format
    Generate {
        #[arg(short, long)]
        level: Option<Level>,

        /// Topic every session should cover
        #[arg(short, long)]
        topic: Option<String>,

        /// Number of sessions to ask for (1-10)
        #[arg(short = 'n', long, default_value = "3")]
        count: u32,
    },

    /// Brief an AI partner on one phase of a session
    Partner {
        /// Session id
        id: String,

        /// Phase number, starting at 1
        #[arg(short, long, default_value = "1")]
        phase: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, stdout belongs to the runner)
    let _log_guard =
        fluenthour_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("fluenthour starting");

    let ctx = AppContext::open(config)?;
    let library = &cli.library;

    let result = match cli.command {
        Some(Command::List { level, json }) => commands::library::list(&ctx, library, level, json),
        Some(Command::Show { id, json }) => commands::library::show(&ctx, library, &id, json),
        Some(Command::Check { files }) => commands::library::check(&ctx, library, &files),
        Some(Command::Import { file }) => commands::library::import(&ctx, file.as_deref()),
        Some(Command::Imports { remove }) => commands::library::imports(&ctx, remove.as_deref()),
        Some(Command::Next { pick }) => commands::practice::next(&ctx, library, &pick),
        Some(Command::Run {
            id,
            pick,
            boundary,
            dry_run,
        }) => commands::run::run(
            &ctx,
            library,
            &commands::run::RunOptions {
                id,
                pick,
                boundary,
                dry_run,
            },
        ),
        Some(Command::Complete { id }) => commands::practice::complete(&ctx, library, &id),
        Some(Command::Stats { json }) => commands::practice::stats(&ctx, library, json),
        Some(Command::Prompt { kind }) => match kind {
            PromptKind::Generate {
                level,
                topic,
                count,
            } => commands::prompt::generate(&ctx, library, level, topic, count),
            PromptKind::Partner { id, phase } => {
                commands::prompt::partner(&ctx, library, &id, phase)
            }
        },
        Some(Command::Reset {
            level,
            history,
            practice,
            yes,
        }) => commands::practice::reset(
            &ctx,
            &commands::practice::ResetOptions {
                level,
                history,
                practice,
                yes,
            },
        ),
        None => commands::run::run(&ctx, library, &commands::run::RunOptions::default()),
    };

    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
    }
    tracing::info!("fluenthour shutting down");

    result
}
