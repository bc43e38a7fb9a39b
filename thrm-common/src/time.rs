//! Timestamp helpers

use chrono::Utc;

/// Current wall-clock time as fractional seconds since the UNIX epoch.
///
/// Dashboard payloads carry timestamps in this form.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
