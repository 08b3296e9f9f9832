//! Error types for the trigger gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the trigger gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing or invalid environment)
    #[error("configuration error: {0}")]
    Config(String),

    /// Telegram Bot API error
    #[error("channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database error (pool acquisition, lookup timeout)
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
