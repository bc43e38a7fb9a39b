//! Tone synthesis
//!
//! Each output sample is the weighted sum of the profile's harmonics of the
//! current frequency, divided by the profile's amplitude sum and scaled by
//! volume:
//!
//! ```text
//! s(t) = volume * Σ amp_k · sin(2π · f · mult_k · t) / Σ amp_k
//! ```
//!
//! [`ToneSynthesizer::render_buffer`] is stateless (t restarts at 0) and is used
//! for visualization. [`ToneSynthesizer::fill`] feeds the audio device and keeps
//! one phase accumulator per harmonic, so consecutive blocks join without a
//! phase jump. With `phase_continuous = false` the accumulators restart at zero
//! on every block, reproducing the reset-per-buffer behaviour.

pub mod harmonics;
pub mod params;

use std::f64::consts::TAU;
use std::sync::Arc;

pub use harmonics::{Harmonic, HarmonicProfile};
pub use params::{AudioParameters, ParameterStore};

use crate::{Error, Result};

/// Harmonic tone generator at a fixed sample rate
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    profile: Arc<HarmonicProfile>,
    sample_rate: u32,
    /// Phase of each harmonic in cycles, [0, 1)
    phases: Vec<f64>,
    phase_continuous: bool,
}

impl ToneSynthesizer {
    pub fn new(profile: Arc<HarmonicProfile>, sample_rate: u32, phase_continuous: bool) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        let phases = vec![0.0; profile.len()];
        Ok(Self {
            profile,
            sample_rate,
            phases,
            phase_continuous,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn profile(&self) -> &HarmonicProfile {
        &self.profile
    }

    /// Samples in a buffer of `duration_secs`: `round(sample_rate * duration)`
    pub fn buffer_len(&self, duration_secs: f64) -> usize {
        (self.sample_rate as f64 * duration_secs).round() as usize
    }

    /// Render a fresh buffer of `duration_secs` starting at t = 0.
    ///
    /// Silent parameters yield all zeros of the same length.
    pub fn render_buffer(&self, params: &AudioParameters, duration_secs: f64) -> Result<Vec<f32>> {
        if !(duration_secs.is_finite() && duration_secs >= 0.0) {
            return Err(Error::Synthesis(format!("invalid duration {}", duration_secs)));
        }
        let len = self.buffer_len(duration_secs);
        if params.is_silent() {
            return Ok(vec![0.0; len]);
        }
        check_finite(params)?;

        let scale = params.volume / self.profile.normalization();
        let sr = self.sample_rate as f64;
        let samples = (0..len)
            .map(|n| {
                let t = n as f64 / sr;
                let sum: f64 = self
                    .profile
                    .harmonics()
                    .iter()
                    .map(|h| h.amplitude * (TAU * params.frequency_hz * h.multiplier * t).sin())
                    .sum();
                (sum * scale) as f32
            })
            .collect();
        Ok(samples)
    }

    /// Fill `out` with the next block of the running tone.
    ///
    /// Silent parameters zero the block and rewind the oscillators so the next
    /// note starts at a zero crossing.
    pub fn fill(&mut self, params: &AudioParameters, out: &mut [f32]) -> Result<()> {
        if params.is_silent() {
            out.fill(0.0);
            self.reset_phase();
            return Ok(());
        }
        check_finite(params)?;

        if !self.phase_continuous {
            self.reset_phase();
        }

        let scale = params.volume / self.profile.normalization();
        let base_step = params.frequency_hz / self.sample_rate as f64;
        let harmonics = self.profile.harmonics();

        for sample in out.iter_mut() {
            let mut sum = 0.0;
            for (h, phase) in harmonics.iter().zip(self.phases.iter_mut()) {
                sum += h.amplitude * (TAU * *phase).sin();
                *phase = (*phase + base_step * h.multiplier).fract();
            }
            *sample = (sum * scale) as f32;
        }
        Ok(())
    }

    /// Restart every harmonic at phase zero
    pub fn reset_phase(&mut self) {
        self.phases.fill(0.0);
    }
}

fn check_finite(params: &AudioParameters) -> Result<()> {
    if !params.frequency_hz.is_finite() || !params.volume.is_finite() {
        return Err(Error::Synthesis(format!(
            "non-finite parameters: {} Hz, volume {}",
            params.frequency_hz, params.volume
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_profile() -> Arc<HarmonicProfile> {
        Arc::new(
            HarmonicProfile::new(&[(1.0, 1.0), (2.0, 0.8), (3.0, 1.75), (4.0, 0.25), (5.0, 0.18)])
                .unwrap(),
        )
    }

    fn synth(phase_continuous: bool) -> ToneSynthesizer {
        ToneSynthesizer::new(reference_profile(), 44100, phase_continuous).unwrap()
    }

    fn playing(frequency_hz: f64, volume: f64) -> AudioParameters {
        AudioParameters { frequency_hz, volume, is_playing: true }
    }

    #[test]
    fn test_buffer_length_is_rounded() {
        let s = synth(true);
        assert_eq!(s.render_buffer(&playing(440.0, 1.0), 0.05).unwrap().len(), 2205);
        assert_eq!(s.render_buffer(&playing(440.0, 1.0), 0.02).unwrap().len(), 882);
        // 44100 * 0.00001 = 0.441 -> 0, 44100 * 0.0000114 = 0.50274 -> 1
        assert_eq!(s.render_buffer(&playing(440.0, 1.0), 0.00001).unwrap().len(), 0);
        assert_eq!(s.render_buffer(&playing(440.0, 1.0), 0.0000114).unwrap().len(), 1);
    }

    #[test]
    fn test_gate_off_renders_silence() {
        let s = synth(true);
        for (f, v) in [(440.0, 1.0), (1024.0, 0.3), (0.0, 0.0), (f64::NAN, 2.0)] {
            let params = AudioParameters { frequency_hz: f, volume: v, is_playing: false };
            let buf = s.render_buffer(&params, 0.05).unwrap();
            assert_eq!(buf.len(), 2205);
            assert!(buf.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_zero_frequency_renders_silence() {
        let s = synth(true);
        let buf = s.render_buffer(&playing(0.0, 1.0), 0.01).unwrap();
        assert!(buf.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_output_bounded_by_volume() {
        let s = synth(true);
        for volume in [1.0, 0.5, 0.1] {
            let buf = s.render_buffer(&playing(256.0, volume), 0.05).unwrap();
            let peak = buf.iter().fold(0.0f32, |m, x| m.max(x.abs()));
            assert!(peak > 0.0);
            assert!(peak as f64 <= volume + 1e-6, "peak {} exceeds volume {}", peak, volume);
        }
    }

    #[test]
    fn test_starts_at_zero_crossing() {
        let s = synth(true);
        let buf = s.render_buffer(&playing(440.0, 1.0), 0.01).unwrap();
        assert_eq!(buf[0], 0.0);
        assert!(buf[1] > 0.0);
    }

    #[test]
    fn test_single_harmonic_matches_sine() {
        let profile = Arc::new(HarmonicProfile::new(&[(1.0, 2.0)]).unwrap());
        let s = ToneSynthesizer::new(profile, 8000, true).unwrap();
        let buf = s.render_buffer(&playing(1000.0, 0.5), 0.001).unwrap();
        for (n, x) in buf.iter().enumerate() {
            let expected = 0.5 * (TAU * 1000.0 * n as f64 / 8000.0).sin();
            assert!((*x as f64 - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_non_finite_frequency_is_error() {
        let s = synth(true);
        assert!(matches!(
            s.render_buffer(&playing(f64::NAN, 0.5), 0.01),
            Err(Error::Synthesis(_))
        ));
        let mut s = synth(true);
        let mut out = vec![1.0; 64];
        assert!(s.fill(&playing(f64::INFINITY, 0.5), &mut out).is_err());
    }

    #[test]
    fn test_fill_first_block_matches_render() {
        let mut s = synth(true);
        let params = playing(523.25, 0.8);
        let rendered = s.render_buffer(&params, 0.01).unwrap();
        let mut filled = vec![0.0; rendered.len()];
        s.fill(&params, &mut filled).unwrap();
        for (a, b) in rendered.iter().zip(filled.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_fill_is_phase_continuous_across_blocks() {
        let params = playing(440.0, 1.0);

        // One long block
        let mut whole = synth(true);
        let mut expected = vec![0.0; 1000];
        whole.fill(&params, &mut expected).unwrap();

        // Same span as two blocks
        let mut split = synth(true);
        let mut first = vec![0.0; 437];
        let mut second = vec![0.0; 563];
        split.fill(&params, &mut first).unwrap();
        split.fill(&params, &mut second).unwrap();

        let joined: Vec<f32> = first.into_iter().chain(second).collect();
        for (a, b) in expected.iter().zip(joined.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_reset_mode_restarts_each_block() {
        let params = playing(440.0, 1.0);
        let mut s = synth(false);
        let mut first = vec![0.0; 300];
        let mut second = vec![0.0; 300];
        s.fill(&params, &mut first).unwrap();
        s.fill(&params, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_silence_rewinds_oscillators() {
        let params = playing(440.0, 1.0);
        let mut s = synth(true);
        let mut buf = vec![0.0; 300];
        s.fill(&params, &mut buf).unwrap();

        let mut silent = vec![1.0; 300];
        s.fill(&AudioParameters { is_playing: false, ..params }, &mut silent).unwrap();
        assert!(silent.iter().all(|&x| x == 0.0));

        let mut resumed = vec![0.0; 300];
        s.fill(&params, &mut resumed).unwrap();
        assert_eq!(resumed[0], 0.0);
        assert_eq!(resumed, buf);
    }
}
