//! Database layer for fluenthour
//!
//! This module provides the progress store using SQLite with:
//! - Schema migrations
//! - Repository methods for completions, practice time, history and imports

pub mod repo;
pub mod schema;

pub use repo::{import_hash, CompletionRecord, Database, ImportRecord, HISTORY_KEY, LAST_LEVEL_KEY};
