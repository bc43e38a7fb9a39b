//! Common error types for the theremin services

use thiserror::Error;

/// Common result type for theremin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the theremin services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration file could not be parsed
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Publish/subscribe transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}
