//! Sensor capability
//!
//! The hardware driver is external; anything that can read a distance and a
//! potentiometer position implements [`SensorDevice`].

use rand::Rng;
use std::time::Instant;

use crate::{Error, Result};

/// Raw sensor access
pub trait SensorDevice: Send {
    /// Raw distance in centimetres
    fn read_distance_raw(&mut self) -> Result<f64>;

    /// Raw potentiometer reading, `0..=pot_max_raw`
    fn read_potentiometer_raw(&mut self) -> Result<u16>;
}

/// Simulated hand in front of the sensor.
///
/// The hand sweeps `15 ± 12` cm (occasionally leaving the playing range) and the
/// volume knob follows `0.5 + 0.5·|sin 2t|`. Readings carry a little jitter and
/// fail with probability `failure_rate`.
pub struct SimulatedSensor {
    started: Instant,
    pot_max_raw: u16,
    failure_rate: f64,
    jitter_cm: f64,
}

impl SimulatedSensor {
    pub fn new(pot_max_raw: u16, failure_rate: f64) -> Self {
        Self {
            started: Instant::now(),
            pot_max_raw,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            jitter_cm: 0.3,
        }
    }

    /// Hand distance (cm) at `t` seconds
    pub fn distance_at(t: f64) -> f64 {
        15.0 + 12.0 * (t * 3.0).sin()
    }

    /// Volume knob position in [0, 1] at `t` seconds
    pub fn volume_at(t: f64) -> f64 {
        0.5 + 0.5 * (t * 2.0).sin().abs()
    }

    fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn maybe_fail(&self, what: &str) -> Result<()> {
        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            return Err(Error::SensorRead(format!("simulated {} read timeout", what)));
        }
        Ok(())
    }
}

impl SensorDevice for SimulatedSensor {
    fn read_distance_raw(&mut self) -> Result<f64> {
        self.maybe_fail("ultrasonic")?;
        let jitter = rand::thread_rng().gen_range(-self.jitter_cm..=self.jitter_cm);
        Ok((Self::distance_at(self.elapsed()) + jitter).max(0.0))
    }

    fn read_potentiometer_raw(&mut self) -> Result<u16> {
        self.maybe_fail("potentiometer")?;
        let raw = Self::volume_at(self.elapsed()) * self.pot_max_raw as f64;
        Ok(raw.round().clamp(0.0, self.pot_max_raw as f64) as u16)
    }
}
