//! Error types for fluenthour-core
//!
//! Only the I/O edges (config, progress store, library files, logging) can fail.
//! The parser, the selection strategy and the runner are total and never return
//! these errors.

use thiserror::Error;

/// Main error type for the fluenthour-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error for key-value blobs
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A library source could not be read
    #[error("library error in {source_name}: {message}")]
    Library {
        source_name: String,
        message: String,
    },

    /// Session not found in the catalog
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Result type alias for fluenthour-core
pub type Result<T> = std::result::Result<T, Error>;
