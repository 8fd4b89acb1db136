//! Error types for tally-core

use thiserror::Error;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error (connection refused, timeout, undecodable body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the remote API
    #[error("Remote API error: {message} (HTTP {status})")]
    Transport {
        /// HTTP status code
        status: u16,
        /// Best-effort message extracted from the response body
        message: String,
    },

    /// The remote API refused the request because the rate limit window is spent
    #[error("Rate limit exhausted{}; retry later", reset_hint(.reset_at))]
    RateLimitExhausted {
        /// Unix timestamp (seconds) at which the window resets, when known
        reset_at: Option<i64>,
    },

    /// Missing or unusable API credentials
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),
}

fn reset_hint(reset_at: &Option<i64>) -> String {
    reset_at
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|at| format!(" until {}", at.format("%H:%M:%S UTC")))
        .unwrap_or_default()
}
