//! Harmonic profile (timbre)

use crate::{Error, Result};

/// One partial of the tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    /// Frequency multiple of the fundamental
    pub multiplier: f64,
    /// Weight of this partial
    pub amplitude: f64,
}

/// Immutable set of harmonics loaded at startup.
///
/// The sum of amplitudes is the fixed normalization divisor, so the summed
/// waveform never exceeds 1.0 before volume scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicProfile {
    harmonics: Vec<Harmonic>,
    amplitude_sum: f64,
}

impl HarmonicProfile {
    /// Build from `(multiplier, amplitude)` pairs.
    ///
    /// Rejects an empty profile and non-positive multipliers or amplitudes.
    pub fn new(pairs: &[(f64, f64)]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(Error::Config("harmonic profile is empty".to_string()));
        }

        let mut harmonics = Vec::with_capacity(pairs.len());
        for &(multiplier, amplitude) in pairs {
            if !(multiplier.is_finite() && multiplier > 0.0) {
                return Err(Error::Config(format!("invalid harmonic multiplier {}", multiplier)));
            }
            if !(amplitude.is_finite() && amplitude > 0.0) {
                return Err(Error::Config(format!("invalid harmonic amplitude {}", amplitude)));
            }
            harmonics.push(Harmonic { multiplier, amplitude });
        }

        let amplitude_sum = harmonics.iter().map(|h| h.amplitude).sum();
        Ok(Self { harmonics, amplitude_sum })
    }

    pub fn harmonics(&self) -> &[Harmonic] {
        &self.harmonics
    }

    pub fn len(&self) -> usize {
        self.harmonics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harmonics.is_empty()
    }

    /// Normalization divisor (sum of amplitudes)
    pub fn normalization(&self) -> f64 {
        self.amplitude_sum
    }
}
