//! Event types shared between the sensing node, the server and the dashboard
//!
//! Two families of messages flow through the system:
//! - [`BusMessage`]: raw sensor/control traffic on the publish/subscribe bus
//! - [`DashboardEvent`]: state pushed to browser dashboards

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Bus topics known to the theremin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Filtered distance in centimetres, decimal string payload
    SensorsDistance,
    /// Normalized volume in [0, 1], decimal string payload
    SensorsVolume,
    /// Informational status text
    ControlStatus,
}

impl Topic {
    /// All topics the server subscribes to
    pub const ALL: [Topic; 3] = [Topic::SensorsDistance, Topic::SensorsVolume, Topic::ControlStatus];

    /// Wire name of the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::SensorsDistance => "sensors/distance",
            Topic::SensorsVolume => "sensors/volume",
            Topic::ControlStatus => "control/status",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensors/distance" => Ok(Topic::SensorsDistance),
            "sensors/volume" => Ok(Topic::SensorsVolume),
            "control/status" => Ok(Topic::ControlStatus),
            other => Err(Error::InvalidInput(format!("Unknown topic: {}", other))),
        }
    }
}

/// One message on the publish/subscribe bus
///
/// The topic is kept as a string so unknown topics from foreign publishers can
/// be logged and dropped by the receiver instead of failing at the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

impl BusMessage {
    pub fn new(topic: Topic, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.as_str().to_string(),
            payload: payload.into(),
        }
    }
}

/// Events pushed to dashboard clients
///
/// Serialized untagged: the SSE event name carries the variant (see
/// [`DashboardEvent::event_name`]) and the data is the bare field object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DashboardEvent {
    /// Current synthesis parameters
    AudioState {
        frequency: f64,
        volume: f64,
        distance: f64,
        playing: bool,
    },

    /// Latest sensor readings
    SensorUpdate {
        distance: f64,
        volume: f64,
        /// Seconds since UNIX epoch
        timestamp: f64,
    },

    /// Downsampled waveform for visualization
    WaveformData { samples: Vec<f32> },
}

impl DashboardEvent {
    /// SSE event name expected by the dashboard
    pub fn event_name(&self) -> &'static str {
        match self {
            DashboardEvent::AudioState { .. } => "audio_state",
            DashboardEvent::SensorUpdate { .. } => "sensor_update",
            DashboardEvent::WaveformData { .. } => "waveform_data",
        }
    }
}
