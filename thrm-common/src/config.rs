//! Startup configuration for the theremin services
//!
//! Every tunable of the signal path lives in [`ThereminConfig`]. Each field has a
//! built-in default matching the reference instrument, so a missing or partial
//! TOML file still produces a playable configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line argument (`--config <path>`)
//! 2. Environment variable (`THRM_CONFIG`)
//! 3. Platform config file (`<config_dir>/thrm/config.toml`)
//! 4. Built-in defaults (code constants)
//!
//! [`ThereminConfig::validate`] must pass before any component is built from the
//! configuration. It is the only error class that terminates the process.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "THRM_CONFIG";

/// Complete theremin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ThereminConfig {
    pub transport: TransportConfig,
    pub server: ServerConfig,
    pub sensing: SensingConfig,
    pub mapping: MappingConfig,
    pub audio: AudioConfig,
    pub synth: SynthConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

/// Publish/subscribe bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Broker host (used by broker-backed transports)
    pub broker_host: String,
    /// Broker port
    pub broker_port: u16,
    /// Messages buffered per subscriber before the oldest are dropped
    pub capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            capacity: 256,
        }
    }
}

impl TransportConfig {
    /// `host:port` of the broker
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }
}

/// Dashboard HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Sensing node settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensingConfig {
    /// Sensor polling and publish rate (Hz)
    pub publish_rate_hz: f64,
    /// Moving-average window over raw distance samples
    pub filter_window: usize,
    /// Full-scale potentiometer reading
    pub pot_max_raw: u16,
    /// Probability that a simulated read fails (0.0 = never)
    pub simulated_failure_rate: f64,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            publish_rate_hz: 20.0,
            filter_window: 5,
            pot_max_raw: 1023,
            simulated_failure_rate: 0.0,
        }
    }
}

/// Distance-to-pitch mapping bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Closest distance of the playing range (cm), maps to `max_hz`
    pub min_cm: f64,
    /// Farthest distance of the playing range (cm), maps to `min_hz`
    pub max_cm: f64,
    /// Lower edge of the tolerance band below `min_cm`
    pub buffer_min_cm: f64,
    /// Upper edge of the tolerance band above `max_cm`
    pub buffer_max_cm: f64,
    pub min_hz: f64,
    pub max_hz: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            min_cm: 2.0,
            max_cm: 25.0,
            buffer_min_cm: 0.0,
            buffer_max_cm: 27.0,
            min_hz: 256.0,  // C4
            max_hz: 1024.0, // C6
        }
    }
}

/// Audio output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration of one output block (seconds)
    pub chunk_duration: f64,
    /// Output device name (None = system default)
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 44100,
            channels: 1,
            chunk_duration: 0.05,
            device: None,
        }
    }
}

impl AudioConfig {
    /// Frames per output block
    pub fn block_size(&self) -> usize {
        (self.sample_rate as f64 * self.chunk_duration).round() as usize
    }
}

/// Tone synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// `(multiplier, amplitude)` pairs, fundamental first
    pub harmonics: Vec<(f64, f64)>,
    /// Carry oscillator phase across buffers instead of restarting at zero
    pub phase_continuous: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            harmonics: vec![
                (1.0, 1.00),
                (2.0, 0.80),
                (3.0, 1.75),
                (4.0, 0.25),
                (5.0, 0.18),
            ],
            phase_continuous: true,
        }
    }
}

/// Dashboard broadcast settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub broadcast_rate_hz: f64,
    /// Length of the rendered visualization window (seconds)
    pub waveform_duration: f64,
    /// Keep every Nth rendered sample
    pub waveform_stride: usize,
    /// Points in the flat waveform sent while silent
    pub silence_points: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            broadcast_rate_hz: 20.0,
            waveform_duration: 0.02,
            waveform_stride: 20,
            silence_points: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ThereminConfig {
    /// Parse configuration from TOML text; absent keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a configuration file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration following the priority chain, then validate it
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        let config = match resolve_config_path(cli_arg) {
            ConfigSource::Explicit(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_file(&path).map_err(|e| {
                    Error::Config(format!("Failed to load {}: {}", path.display(), e))
                })?
            }
            ConfigSource::Platform(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_file(&path)?
            }
            ConfigSource::Defaults => {
                warn!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the signal path cannot run with
    pub fn validate(&self) -> Result<()> {
        let m = &self.mapping;
        let finite = [m.min_cm, m.max_cm, m.buffer_min_cm, m.buffer_max_cm, m.min_hz, m.max_hz];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(invalid("mapping values must be finite"));
        }
        if m.max_cm <= m.min_cm {
            return Err(invalid(format!(
                "mapping.max_cm ({}) must be greater than mapping.min_cm ({})",
                m.max_cm, m.min_cm
            )));
        }
        if m.buffer_min_cm > m.min_cm {
            return Err(invalid("mapping.buffer_min_cm must not exceed mapping.min_cm"));
        }
        if m.buffer_max_cm < m.max_cm {
            return Err(invalid("mapping.buffer_max_cm must not be below mapping.max_cm"));
        }
        if m.min_hz < 0.0 || m.max_hz < m.min_hz {
            return Err(invalid(format!(
                "frequency range {}..{} Hz is invalid",
                m.min_hz, m.max_hz
            )));
        }

        let a = &self.audio;
        if a.sample_rate == 0 {
            return Err(invalid("audio.sample_rate must be positive"));
        }
        if a.channels == 0 {
            return Err(invalid("audio.channels must be positive"));
        }
        if !(a.chunk_duration.is_finite() && a.chunk_duration > 0.0) || a.block_size() == 0 {
            return Err(invalid("audio.chunk_duration must yield at least one frame"));
        }

        if self.synth.harmonics.is_empty() {
            return Err(invalid("synth.harmonics must not be empty"));
        }
        for (multiplier, amplitude) in &self.synth.harmonics {
            if !(multiplier.is_finite() && *multiplier > 0.0) {
                return Err(invalid(format!("harmonic multiplier {} must be positive", multiplier)));
            }
            if !(amplitude.is_finite() && *amplitude > 0.0) {
                return Err(invalid(format!("harmonic amplitude {} must be positive", amplitude)));
            }
        }

        let s = &self.sensing;
        if s.filter_window == 0 {
            return Err(invalid("sensing.filter_window must be at least 1"));
        }
        if s.pot_max_raw == 0 {
            return Err(invalid("sensing.pot_max_raw must be positive"));
        }
        if !(s.publish_rate_hz.is_finite() && s.publish_rate_hz > 0.0) {
            return Err(invalid("sensing.publish_rate_hz must be positive"));
        }
        if !(0.0..=1.0).contains(&s.simulated_failure_rate) {
            return Err(invalid("sensing.simulated_failure_rate must be within [0, 1]"));
        }

        let d = &self.dashboard;
        if !(d.broadcast_rate_hz.is_finite() && d.broadcast_rate_hz > 0.0) {
            return Err(invalid("dashboard.broadcast_rate_hz must be positive"));
        }
        if !(d.waveform_duration.is_finite() && d.waveform_duration > 0.0) {
            return Err(invalid("dashboard.waveform_duration must be positive"));
        }
        if d.waveform_stride == 0 {
            return Err(invalid("dashboard.waveform_stride must be at least 1"));
        }

        if self.transport.capacity == 0 {
            return Err(invalid("transport.capacity must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Config(msg.into())
}

/// Where the configuration was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named on the command line or via `THRM_CONFIG`; must load
    Explicit(PathBuf),
    /// Platform config file that exists on disk
    Platform(PathBuf),
    /// No file available
    Defaults,
}

/// Resolve the configuration file following the priority chain
pub fn resolve_config_path(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    if let Some(path) = platform_config_path() {
        if path.exists() {
            return ConfigSource::Platform(path);
        }
    }

    // Priority 4: Built-in defaults
    ConfigSource::Defaults
}

/// `<config_dir>/thrm/config.toml` for the current platform
pub fn platform_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("thrm").join("config.toml"))
}
