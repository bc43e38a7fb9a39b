//! # Theremin Common Library
//!
//! Shared code for the theremin services including:
//! - Error types
//! - Startup configuration (TOML + validation)
//! - Bus topics and message types
//! - Dashboard event types
//! - Publish/subscribe bus abstraction
//! - Timestamp helpers

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
