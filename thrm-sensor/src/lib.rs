//! # Theremin Sensing Node (thrm-sensor)
//!
//! Reads the distance sensor and volume potentiometer, smooths the distance
//! with a moving-average filter, normalizes the volume and publishes both on
//! the bus at a fixed rate.
//!
//! **Architecture:** [`SensorDevice`] (hardware or simulation) → [`SensorFilter`]
//! → [`SensorNode`] periodic task → [`thrm_common::bus::MessageBus`]

pub mod device;
pub mod error;
pub mod filter;
pub mod node;

pub use device::{SensorDevice, SimulatedSensor};
pub use error::{Error, Result};
pub use filter::{normalize_volume, FilteredReading, SensorFilter};
pub use node::SensorNode;
