//! Common error types for SongStats

use thiserror::Error;

/// Common result type for SongStats operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SongStats crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON document could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
