//! # Theremin Server Library (thrm-server)
//!
//! Turns filtered hand distance and volume readings into a harmonic tone and
//! streams the live state to browser dashboards.
//!
//! **Architecture:** bus listener → [`state::StateBus`] → lock-free
//! [`synth::ParameterStore`] → cpal pull callback, with a fixed-rate SSE
//! broadcast loop alongside.

pub mod api;
pub mod audio;
pub mod error;
pub mod mapping;
pub mod sse;
pub mod state;
pub mod synth;
pub mod transport;

pub use error::{Error, Result};
pub use state::StateBus;
