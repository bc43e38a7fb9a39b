//! Distance-to-pitch mapping
//!
//! Closer hand → higher pitch. Three bands, evaluated in order, first match wins:
//!
//! | Band                          | Effective distance | Gate   |
//! |-------------------------------|--------------------|--------|
//! | `min_cm ..= max_cm`           | as measured        | play   |
//! | `max_cm < d <= buffer_max_cm` | `max_cm`           | play   |
//! | `buffer_min_cm <= d < min_cm` | `min_cm`           | play   |
//! | anything else (incl. NaN)     | n/a                | silent |

use thrm_common::config::MappingConfig;

use crate::{Error, Result};

/// Mapper output for one distance reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    pub frequency_hz: f64,
    pub is_playing: bool,
}

impl Pitch {
    pub const SILENT: Pitch = Pitch {
        frequency_hz: 0.0,
        is_playing: false,
    };
}

/// Maps filtered distance to frequency and gate
#[derive(Debug, Clone)]
pub struct ParameterMapper {
    bands: MappingConfig,
}

impl ParameterMapper {
    /// Build a mapper; `max_cm` must exceed `min_cm`
    pub fn new(bands: MappingConfig) -> Result<Self> {
        if !(bands.max_cm > bands.min_cm) {
            return Err(Error::Config(format!(
                "max_cm ({}) must be greater than min_cm ({})",
                bands.max_cm, bands.min_cm
            )));
        }
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &MappingConfig {
        &self.bands
    }

    /// Map a distance (cm) to pitch and gate
    pub fn map(&self, distance_cm: f64) -> Pitch {
        map_distance_to_frequency(distance_cm, &self.bands)
    }
}

/// Map `distance_cm` through the clamp bands of `bands`.
///
/// Assumes `bands.max_cm > bands.min_cm`; [`ParameterMapper::new`] enforces it.
pub fn map_distance_to_frequency(distance_cm: f64, bands: &MappingConfig) -> Pitch {
    let d = distance_cm;
    let effective = if bands.min_cm <= d && d <= bands.max_cm {
        d
    } else if bands.max_cm < d && d <= bands.buffer_max_cm {
        bands.max_cm
    } else if bands.buffer_min_cm <= d && d < bands.min_cm {
        bands.min_cm
    } else {
        return Pitch::SILENT;
    };

    let normalized = (effective - bands.min_cm) / (bands.max_cm - bands.min_cm);
    Pitch {
        frequency_hz: bands.min_hz + (bands.max_hz - bands.min_hz) * (1.0 - normalized),
        is_playing: true,
    }
}
