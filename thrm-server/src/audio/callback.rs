//! Real-time callback body
//!
//! The audio device pulls blocks through [`AudioSource`]. [`render_callback`]
//! wraps every pull: a source error or panic is replaced by a silent block of
//! the requested length and counted in [`CallbackStats`]. Nothing escapes to
//! the audio subsystem.
//!
//! **REAL-TIME SAFE**: the callback path only touches atomics and a `try_lock`.
//! Faults are logged later by [`run_fault_reporter`] on a regular task.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, warn};

use crate::synth::{ParameterStore, ToneSynthesizer};
use crate::Result;

/// Pull interface between the audio device and the synthesizer
pub trait AudioSource: Send {
    /// Fill `out` completely with the next samples
    fn produce_next_buffer(&mut self, out: &mut [f32]) -> Result<()>;
}

/// Synthesizer driven by the shared parameter snapshot
pub struct SynthSource {
    synth: ToneSynthesizer,
    params: Arc<ParameterStore>,
}

impl SynthSource {
    pub fn new(synth: ToneSynthesizer, params: Arc<ParameterStore>) -> Self {
        Self { synth, params }
    }
}

impl AudioSource for SynthSource {
    fn produce_next_buffer(&mut self, out: &mut [f32]) -> Result<()> {
        let params = self.params.load();
        self.synth.fill(&params, out)
    }
}

/// Lock-free callback counters
#[derive(Debug, Default)]
pub struct CallbackStats {
    callbacks: AtomicU64,
    faults: AtomicU64,
    /// Faults already reported by the fault reporter
    reported_faults: AtomicU64,
    /// Most recent fault reason (written with try_lock only)
    last_fault: Mutex<Option<String>>,
}

/// Point-in-time copy of [`CallbackStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallbackCounters {
    pub callbacks: u64,
    pub faults: u64,
}

impl CallbackStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_callback(&self) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fault(&self, reason: String) {
        self.faults.fetch_add(1, Ordering::Relaxed);
        // Skip the reason rather than block the audio thread
        if let Ok(mut last) = self.last_fault.try_lock() {
            *last = Some(reason);
        }
    }

    pub fn counters(&self) -> CallbackCounters {
        CallbackCounters {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }

    /// Log faults recorded since the previous call; returns how many were new
    pub fn report_new_faults(&self) -> u64 {
        let total = self.faults.load(Ordering::Relaxed);
        let previous = self.reported_faults.swap(total, Ordering::Relaxed);
        let new = total.saturating_sub(previous);
        if new > 0 {
            let reason = self
                .last_fault
                .lock()
                .ok()
                .and_then(|last| last.clone())
                .unwrap_or_else(|| "unknown".to_string());
            error!(
                "Audio callback substituted silence {} time(s) (total {}): {}",
                new, total, reason
            );
        }
        new
    }
}

/// Produce one block into `out`, substituting silence on any failure
pub fn render_callback(source: &mut dyn AudioSource, out: &mut [f32], stats: &CallbackStats) {
    stats.record_callback();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.produce_next_buffer(out)));
    let fault = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(_) => "audio source panicked".to_string(),
    };

    out.fill(0.0);
    stats.record_fault(fault);
}

/// Periodically log callback faults until `shutdown` becomes true
pub async fn run_fault_reporter(
    stats: Arc<CallbackStats>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(period);
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tick.tick() => {
                stats.report_new_faults();
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    stats.report_new_faults();
    let counters = stats.counters();
    if counters.faults > 0 {
        warn!("Audio callback faults this session: {}", counters.faults);
    }
    debug!("Audio fault reporter stopped after {} callbacks", counters.callbacks);
}
