//! Audio output using cpal
//!
//! Opens one output stream at the configured sample rate and block size and
//! pulls mono blocks from an [`AudioSource`] on the device's timing thread.
//! The mono block is copied to every device channel.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use thrm_common::config::AudioConfig;
use tracing::{debug, error, info, warn};

use super::callback::{render_callback, AudioSource, CallbackStats};
use crate::{Error, Result};

/// Audio output manager using cpal.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    block_size: usize,
    stream: Option<Stream>,
    /// Callback writes silence while set (drain on stop)
    muted: Arc<AtomicBool>,
    /// Stream error flag - set by the cpal error callback
    error_flag: Arc<AtomicBool>,
    error_count: Arc<AtomicU32>,
    stats: Arc<CallbackStats>,
}

impl AudioOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open the configured device, falling back to the default device when the
    /// requested name is not found.
    pub fn open(audio: &AudioConfig, stats: Arc<CallbackStats>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match audio.device.as_ref() {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

                match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let (config, sample_format) = Self::select_config(&device, audio)?;
        let block_size = audio.block_size();

        info!(
            "Audio device '{}': sample_rate={}, channels={}, format={:?}, block={} frames",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            config.channels,
            sample_format,
            block_size
        );

        Ok(Self {
            device,
            config,
            sample_format,
            block_size,
            stream: None,
            muted: Arc::new(AtomicBool::new(false)),
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
            stats,
        })
    }

    /// Pick a device configuration at the requested sample rate.
    ///
    /// Prefers the requested channel count and f32 samples.
    fn select_config(device: &Device, audio: &AudioConfig) -> Result<(StreamConfig, SampleFormat)> {
        let rate = cpal::SampleRate(audio.sample_rate);
        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .collect();

        let score = |c: &cpal::SupportedStreamConfigRange| {
            let channels_match = c.channels() == audio.channels;
            let is_f32 = c.sample_format() == SampleFormat::F32;
            (channels_match as u8) * 2 + is_f32 as u8
        };

        let best = supported
            .into_iter()
            .filter(|c| {
                matches!(c.sample_format(), SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
            })
            .max_by_key(score)
            .ok_or_else(|| {
                Error::AudioOutput(format!("Device does not support {} Hz output", audio.sample_rate))
            })?;

        let sample_format = best.sample_format();
        let mut config = best.with_sample_rate(rate).config();
        config.buffer_size = cpal::BufferSize::Fixed(audio.block_size() as u32);
        Ok((config, sample_format))
    }

    /// Start pulling blocks from `source`.
    ///
    /// The source runs on the real-time audio thread.
    pub fn start<S>(&mut self, source: S) -> Result<()>
    where
        S: AudioSource + 'static,
    {
        if self.stream.is_some() {
            return Err(Error::AudioOutput("Stream already running".to_string()));
        }
        info!("Starting audio stream");
        self.muted.store(false, Ordering::SeqCst);

        let stream = self.build_stream_any(source, self.config.clone())?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("Audio stream started successfully");
        Ok(())
    }

    fn build_stream_any<S>(&self, source: S, config: StreamConfig) -> Result<Stream>
    where
        S: AudioSource + 'static,
    {
        match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32, S>(source, config),
            SampleFormat::I16 => self.build_stream::<i16, S>(source, config),
            SampleFormat::U16 => self.build_stream::<u16, S>(source, config),
            sample_format => Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                sample_format
            ))),
        }
    }

    fn build_stream<T, S>(&self, mut source: S, config: StreamConfig) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
        S: AudioSource + 'static,
    {
        let channels = config.channels as usize;
        let muted = Arc::clone(&self.muted);
        let stats = Arc::clone(&self.stats);
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);
        let mut mono = vec![0.0f32; self.block_size];

        self.device
            .build_output_stream(
                &config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    if mono.len() < frames {
                        // Device asked for more than the configured block
                        mono.resize(frames, 0.0);
                    }
                    let block = &mut mono[..frames];

                    if muted.load(Ordering::Relaxed) {
                        block.fill(0.0);
                    } else {
                        render_callback(&mut source, block, &stats);
                    }

                    for (frame, &sample) in data.chunks_mut(channels).zip(block.iter()) {
                        let value = T::from_sample(sample.clamp(-1.0, 1.0));
                        frame.fill(value);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Drain and release the stream.
    ///
    /// Mutes the callback, waits two block periods so queued audio plays out
    /// as silence, then pauses and drops the stream. Calling again is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        info!("Stopping audio stream");

        self.muted.store(true, Ordering::SeqCst);
        std::thread::sleep(self.block_duration() * 2);

        let result = stream
            .pause()
            .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)));
        drop(stream);

        info!("Audio stream stopped");
        result
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Wall-clock length of one block
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.config.sample_rate.0 as f64)
    }

    /// Get device name.
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// True once the device has reported a stream error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // This test requires audio hardware
        // Just verify it doesn't panic
        let result = AudioOutput::list_devices();
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_silence_converts_to_equilibrium() {
        assert_eq!(i16::from_sample(0.0f32), i16::EQUILIBRIUM);
        assert_eq!(f32::from_sample(0.0f32), 0.0);
    }
}
