//! Error types for thrm-server
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for thrm-server
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration validation errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bus payload that could not be interpreted; the message is dropped
    #[error("Malformed message on {topic}: {payload:?}")]
    MalformedMessage { topic: String, payload: String },

    /// Publish/subscribe transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Tone synthesis errors
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] thrm_common::Error),
}

/// Convenience Result type using thrm-server Error
pub type Result<T> = std::result::Result<T, Error>;
