//! # fluenthour-core
//!
//! Core library for fluenthour - a guided speaking-practice timer.
//!
//! This library provides:
//! - Domain types for sessions and phases
//! - A tolerant parser for plain-text session libraries
//! - Session selection (random with variety, or a deterministic path)
//! - The session runner state machine with injectable clock and scheduler
//! - Progress storage with SQLite
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows in one direction:
//! - **Library text** (bundled starter, files, imports) is parsed into a [`Catalog`]
//! - **Selection** picks a [`Session`] from the catalog using stored history
//! - **The runner** counts down phases and emits [`ProgressUpdate`]s
//! - **The store** persists those updates; it is the only place with side effects
//!
//! ## Example
//!
//! ```rust,no_run
//! use fluenthour_core::{Catalog, Config, Database, LibrarySource};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! // Load the library
//! let (catalog, report) = Catalog::load(&[LibrarySource::Starter], config.library.default_level);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use library::{Catalog, LibrarySource, LoadReport, ParseReport};
pub use runner::{ProgressUpdate, RunnerState, SessionRunner, TickOutcome};
pub use selection::{RecentHistory, Selector};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod library;
pub mod logging;
pub mod progress;
pub mod prompts;
pub mod runner;
pub mod selection;
pub mod types;
