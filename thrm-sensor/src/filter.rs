//! Sensor smoothing and normalization

use std::collections::VecDeque;

/// Smoothed output of one sensing cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredReading {
    /// Moving average of the most recent raw distances (cm)
    pub filtered_distance_cm: f64,
    /// Potentiometer position in [0, 1]
    pub volume_normalized: f64,
}

/// Fixed-window moving-average filter over raw distance samples.
///
/// Until the window fills, the average covers only the samples received so far.
#[derive(Debug, Clone)]
pub struct SensorFilter {
    window: VecDeque<f64>,
    capacity: usize,
}

impl SensorFilter {
    /// Create a filter averaging the last `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a raw sample, evicting the oldest when full, and return the mean
    pub fn filter_distance(&mut self, raw: f64) -> f64 {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(raw);

        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Current average, None before the first sample
    pub fn current(&self) -> Option<f64> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
        }
    }

    /// Samples currently held
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Scale a raw potentiometer reading into [0, 1].
///
/// Readings above `max_raw` clamp to 1.0. A `max_raw` of zero yields 0.0.
pub fn normalize_volume(raw: u16, max_raw: u16) -> f64 {
    if max_raw == 0 {
        return 0.0;
    }
    (raw as f64 / max_raw as f64).clamp(0.0, 1.0)
}
