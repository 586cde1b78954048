//! Error types for songstats
//!
//! Failures are grouped by the boundary they cross:
//! - [`SourceFailure`]: a source adapter could not answer. Always captured
//!   as data in an outcome, never propagated out of the adapter.
//! - [`TableError`]: the destination table store failed a request.
//! - [`SyncError`]: one row could not be written. Halts that row only.
//! - [`FatalError`]: the run cannot start or continue.

use serde::Serialize;
use thiserror::Error;

/// Source adapter failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SourceFailure {
    /// Call exceeded its time budget
    #[error("timeout")]
    Timeout,

    /// Network communication error
    #[error("network error: {0}")]
    Network(String),

    /// Credentials rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider quota or rate limit exhausted
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Provider returned an unexpected error status
    #[error("provider error {status}: {message}")]
    Provider { status: u16, message: String },

    /// Failed to parse the provider response
    #[error("parse error: {0}")]
    Parse(String),

    /// No adapter configured for a requested source
    #[error("not available: {0}")]
    Unavailable(String),
}

impl SourceFailure {
    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = truncate(body, 200);
        match status.as_u16() {
            429 => SourceFailure::Quota(message),
            403 if body.contains("quota") => SourceFailure::Quota(message),
            401 | 403 => SourceFailure::Auth(message),
            code => SourceFailure::Provider {
                status: code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for SourceFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceFailure::Timeout
        } else if e.is_decode() {
            SourceFailure::Parse(e.to_string())
        } else {
            SourceFailure::Network(e.to_string())
        }
    }
}

/// Destination table store error
#[derive(Debug, Error)]
pub enum TableError {
    /// Spreadsheet or worksheet does not exist or is not shared
    #[error("Table not found: {0}")]
    NotFound(String),

    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Store rejected the request
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the store response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request referenced a row or column outside the table
    #[error("Out of range: {0}")]
    OutOfRange(String),
}

impl From<reqwest::Error> for TableError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TableError::Parse(e.to_string())
        } else {
            TableError::Network(e.to_string())
        }
    }
}

/// Per-row write failure
#[derive(Debug, Error)]
pub enum SyncError {
    /// Destination rejected a column addition
    #[error("Schema error for column '{column}': {source}")]
    Schema {
        column: String,
        #[source]
        source: TableError,
    },

    /// Row changed since it was read; nothing written
    #[error("Stale snapshot: column '{column}' changed since the row was read")]
    StaleSnapshot { column: String },

    /// Cell write failed
    #[error("Write failed: {0}")]
    Write(#[source] TableError),
}

/// Run-level failure that aborts before or between rows
#[derive(Debug, Error)]
pub enum FatalError {
    /// Missing credentials or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Destination table could not be read at startup
    #[error("Destination table unavailable: {0}")]
    DestinationUnavailable(#[source] TableError),

    /// Header row lacks required columns
    #[error("Malformed header row: missing required column(s) {0}")]
    MissingColumns(String),
}

impl From<songstats_common::Error> for FatalError {
    fn from(e: songstats_common::Error) -> Self {
        FatalError::Config(e.to_string())
    }
}

/// Shorten provider error bodies for logs and summaries
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let mut s: String = trimmed.chars().take(max_chars).collect();
        s.push('…');
        s
    }
}
