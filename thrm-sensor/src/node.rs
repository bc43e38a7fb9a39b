//! Sensing loop
//!
//! Polls the [`SensorDevice`] at a fixed rate, filters the readings and
//! publishes them on the bus. A failed read skips the cycle: nothing is
//! published and the filter window is left untouched.

use std::sync::Arc;
use std::time::Duration;

use thrm_common::bus::MessageBus;
use thrm_common::config::SensingConfig;
use thrm_common::events::Topic;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::device::SensorDevice;
use crate::filter::{normalize_volume, FilteredReading, SensorFilter};
use crate::{Error, Result};

/// Counters reported when the sensing loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Cycles whose readings were published
    pub published: u64,
    /// Cycles skipped because a sensor read failed
    pub skipped: u64,
}

/// Sensing node: device + filter + publisher
pub struct SensorNode<D: SensorDevice> {
    device: D,
    filter: SensorFilter,
    bus: Arc<dyn MessageBus>,
    pot_max_raw: u16,
    period: Duration,
    stats: NodeStats,
}

impl<D: SensorDevice> SensorNode<D> {
    pub fn new(device: D, bus: Arc<dyn MessageBus>, config: &SensingConfig) -> Self {
        Self {
            device,
            filter: SensorFilter::new(config.filter_window),
            bus,
            pot_max_raw: config.pot_max_raw,
            period: Duration::from_secs_f64(1.0 / config.publish_rate_hz),
            stats: NodeStats::default(),
        }
    }

    /// Read both sensors and filter the result.
    ///
    /// Returns None when either read fails.
    pub fn sample(&mut self) -> Option<FilteredReading> {
        let raw_distance = match self.device.read_distance_raw() {
            Ok(d) => d,
            Err(e) => {
                warn!("Error reading distance sensor: {}", e);
                return None;
            }
        };
        let raw_pot = match self.device.read_potentiometer_raw() {
            Ok(p) => p,
            Err(e) => {
                warn!("Error reading potentiometer: {}", e);
                return None;
            }
        };

        Some(FilteredReading {
            filtered_distance_cm: self.filter.filter_distance(raw_distance),
            volume_normalized: normalize_volume(raw_pot, self.pot_max_raw),
        })
    }

    /// Publish one reading: distance first, then volume
    pub fn publish(&self, reading: &FilteredReading) -> Result<()> {
        self.bus
            .publish(Topic::SensorsDistance, reading.filtered_distance_cm.to_string())
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.bus
            .publish(Topic::SensorsVolume, reading.volume_normalized.to_string())
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(())
    }

    /// Run one sensing cycle
    pub fn tick(&mut self) {
        match self.sample() {
            Some(reading) => {
                if let Err(e) = self.publish(&reading) {
                    warn!("Failed to publish sensor reading: {}", e);
                }
                self.stats.published += 1;
                debug!(
                    "Distance: {:.1}cm | Volume: {:.2}",
                    reading.filtered_distance_cm, reading.volume_normalized
                );
            }
            None => self.stats.skipped += 1,
        }
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Poll at the configured rate until `shutdown` becomes true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> NodeStats {
        info!(
            "Starting sensor readings at {:.1} Hz (filter window {})",
            1.0 / self.period.as_secs_f64(),
            self.filter.capacity()
        );
        self.announce("sensor node online");

        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => self.tick(),
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.announce("sensor node offline");
        info!(
            "Stopping sensor readings ({} published, {} skipped)",
            self.stats.published, self.stats.skipped
        );
        self.stats
    }

    fn announce(&self, status: &str) {
        if let Err(e) = self.bus.publish(Topic::ControlStatus, status.to_string()) {
            debug!("Status '{}' not delivered: {}", status, e);
        }
    }
}
