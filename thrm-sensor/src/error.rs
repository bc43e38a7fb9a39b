//! Error types for thrm-sensor

use thiserror::Error;

/// Main error type for the sensing node
#[derive(Error, Debug)]
pub enum Error {
    /// A sensor read failed; the cycle is skipped
    #[error("Sensor read error: {0}")]
    SensorRead(String),

    /// Publishing to the bus failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] thrm_common::Error),
}

/// Convenience Result type using thrm-sensor Error
pub type Result<T> = std::result::Result<T, Error>;
