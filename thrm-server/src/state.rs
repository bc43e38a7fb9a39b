//! Shared theremin state
//!
//! [`StateBus`] is the single owner of the synthesis parameters and of the
//! display values shown on the dashboard. Bus messages enter through
//! [`StateBus::on_sensor_event`]; dashboards are fed by a periodic broadcast
//! loop that publishes a [`DashboardSnapshot`] at a fixed cadence, independent
//! of how fast sensor messages arrive.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thrm_common::config::DashboardConfig;
use thrm_common::events::{DashboardEvent, Topic};
use thrm_common::time::now_secs;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::mapping::ParameterMapper;
use crate::sse::SseBroadcaster;
use crate::synth::{AudioParameters, ParameterStore, ToneSynthesizer};
use crate::{Error, Result};

/// Values shown on the dashboard that are not synthesis parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayState {
    /// Last filtered distance received, as measured (cm)
    pub distance_cm: f64,
    /// Last volume received, clamped to [0, 1]
    pub volume: f64,
    /// Seconds since UNIX epoch of the last sensor message
    pub last_update: f64,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            distance_cm: 0.0,
            volume: 0.5,
            last_update: 0.0,
        }
    }
}

/// Point-in-time view pushed to dashboards and served on `GET /state`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub frequency_hz: f64,
    pub volume: f64,
    pub distance_cm: f64,
    pub is_playing: bool,
    pub timestamp: f64,
    pub waveform_samples: Vec<f32>,
}

impl DashboardSnapshot {
    /// Split into the three dashboard events, in broadcast order
    pub fn into_events(self) -> [DashboardEvent; 3] {
        [
            DashboardEvent::AudioState {
                frequency: self.frequency_hz,
                volume: self.volume,
                distance: self.distance_cm,
                playing: self.is_playing,
            },
            DashboardEvent::SensorUpdate {
                distance: self.distance_cm,
                volume: self.volume,
                timestamp: self.timestamp,
            },
            DashboardEvent::WaveformData {
                samples: self.waveform_samples,
            },
        ]
    }
}

/// Process-wide theremin state
pub struct StateBus {
    params: Arc<ParameterStore>,
    display: RwLock<DisplayState>,
    mapper: ParameterMapper,
    /// Stateless renderer for the dashboard waveform
    visualizer: ToneSynthesizer,
    dashboard: DashboardConfig,
    broadcaster: SseBroadcaster,
}

impl StateBus {
    pub fn new(
        params: Arc<ParameterStore>,
        mapper: ParameterMapper,
        visualizer: ToneSynthesizer,
        dashboard: DashboardConfig,
        broadcaster: SseBroadcaster,
    ) -> Self {
        let initial = params.load();
        Self {
            params,
            display: RwLock::new(DisplayState {
                volume: initial.volume,
                ..DisplayState::default()
            }),
            mapper,
            visualizer,
            dashboard,
            broadcaster,
        }
    }

    /// Handle one bus message.
    ///
    /// Returns [`Error::MalformedMessage`] for a sensor payload that is not a
    /// finite decimal number; state is left untouched in that case. Unknown
    /// topics are ignored.
    pub async fn on_sensor_event(&self, topic: &str, payload: &str) -> Result<()> {
        let topic = match Topic::from_str(topic) {
            Ok(topic) => topic,
            Err(_) => {
                debug!("Ignoring message on unknown topic {}", topic);
                return Ok(());
            }
        };

        match topic {
            Topic::SensorsDistance => {
                let distance = parse_reading(topic, payload)?;
                self.apply_distance(distance).await;
            }
            Topic::SensorsVolume => {
                let volume = parse_reading(topic, payload)?.clamp(0.0, 1.0);
                self.apply_volume(volume).await;
            }
            Topic::ControlStatus => {
                info!("Status: {}", payload.trim());
            }
        }
        Ok(())
    }

    async fn apply_distance(&self, distance_cm: f64) {
        let pitch = self.mapper.map(distance_cm);

        // Display and parameters change together under the write lock
        let mut display = self.display.write().await;
        display.distance_cm = distance_cm;
        display.last_update = now_secs();
        let params = self.params.update(|p| {
            p.frequency_hz = pitch.frequency_hz;
            p.is_playing = pitch.is_playing;
        });
        drop(display);

        if params.is_playing {
            debug!(
                "PLAYING | Freq: {:.1} Hz | Vol: {:.2} | Dist: {:.1}cm",
                params.frequency_hz, params.volume, distance_cm
            );
        } else {
            debug!("SILENT  | Distance: {:.1}cm (outside threshold)", distance_cm);
        }
    }

    async fn apply_volume(&self, volume: f64) {
        let mut display = self.display.write().await;
        display.volume = volume;
        display.last_update = now_secs();
        self.params.update(|p| p.volume = volume);
    }

    /// Current synthesis parameters
    pub fn audio_parameters(&self) -> AudioParameters {
        self.params.load()
    }

    pub async fn display(&self) -> DisplayState {
        *self.display.read().await
    }

    pub fn broadcaster(&self) -> &SseBroadcaster {
        &self.broadcaster
    }

    /// Consistent view of parameters, display values and a short waveform
    pub async fn snapshot(&self) -> DashboardSnapshot {
        let (display, params) = {
            let display = self.display.read().await;
            (*display, self.params.load())
        };

        DashboardSnapshot {
            frequency_hz: params.frequency_hz,
            volume: params.volume,
            distance_cm: display.distance_cm,
            is_playing: params.is_playing,
            timestamp: now_secs(),
            waveform_samples: self.waveform(&params),
        }
    }

    /// Downsampled render for visualization, flat when silent
    fn waveform(&self, params: &AudioParameters) -> Vec<f32> {
        let silence = || vec![0.0; self.dashboard.silence_points];
        if params.is_silent() {
            return silence();
        }
        match self
            .visualizer
            .render_buffer(params, self.dashboard.waveform_duration)
        {
            Ok(samples) => samples
                .into_iter()
                .step_by(self.dashboard.waveform_stride.max(1))
                .collect(),
            Err(e) => {
                warn!("Waveform render failed: {}", e);
                silence()
            }
        }
    }

    /// Event sent to a dashboard as soon as it connects
    pub async fn audio_state_event(&self) -> DashboardEvent {
        let distance = self.display.read().await.distance_cm;
        let params = self.params.load();
        DashboardEvent::AudioState {
            frequency: params.frequency_hz,
            volume: params.volume,
            distance,
            playing: params.is_playing,
        }
    }

    /// Publish one snapshot to connected dashboards.
    ///
    /// Returns false when nobody is listening and nothing was rendered.
    pub async fn broadcast_tick(&self) -> bool {
        if self.broadcaster.client_count() == 0 {
            return false;
        }
        for event in self.snapshot().await.into_events() {
            self.broadcaster.broadcast_lossy(event);
        }
        true
    }

    /// Broadcast at `broadcast_rate_hz` until `shutdown` becomes true
    pub async fn run_broadcast_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs_f64(1.0 / self.dashboard.broadcast_rate_hz);
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Dashboard broadcast loop started ({:?} period)", period);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {
                    self.broadcast_tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Dashboard broadcast loop stopped");
    }
}

fn parse_reading(topic: Topic, payload: &str) -> Result<f64> {
    match payload.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::MalformedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        }),
    }
}
