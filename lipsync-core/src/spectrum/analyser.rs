//! Magnitude spectrum with browser `AnalyserNode` semantics.
//!
//! ## Per frame
//!
//! | Step      | Detail                                              |
//! |-----------|-----------------------------------------------------|
//! | Window    | Blackman, `fft_size` samples                        |
//! | Transform | rustfft forward, keep `fft_size / 2` bins           |
//! | Magnitude | `|X[k]| / fft_size`                                 |
//! | Smoothing | `τ·prev[k] + (1 − τ)·mag[k]`                        |
//! | Scale     | `20·log10`, `[min_db, max_db]` mapped onto `[0, 1]` |
//!
//! A zero window produces exactly zero in every bin, which the classifier
//! relies on to recognise silence.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, Result};

use super::DEFAULT_FFT_SIZE;

/// Configuration for `SpectrumAnalyser`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AnalyserConfig {
    /// Transform size in samples. Power of two in 32..=32768. Default: 2048.
    pub fft_size: usize,
    /// Weight of the previous frame in `[0, 1]`. Default: 0.8.
    pub smoothing_time_constant: f32,
    /// Level mapped to 0.0. Default: -100 dB.
    pub min_decibels: f32,
    /// Level mapped to 1.0. Default: -30 dB.
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    /// # Errors
    /// `ConnectError::InvalidConfig` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(ConnectError::InvalidConfig(format!(
                "fft_size must be a power of two in 32..=32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(ConnectError::InvalidConfig(format!(
                "smoothing_time_constant must be in [0, 1], got {}",
                self.smoothing_time_constant
            )));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(ConnectError::InvalidConfig(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        Ok(())
    }

    /// Number of magnitude bins per frame.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

pub struct SpectrumAnalyser {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Smoothed linear magnitudes carried between frames.
    smoothed: Vec<f32>,
    /// Normalized output of the last `analyse` call.
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyser {
    /// Plan the transform and pre-allocate every buffer.
    ///
    /// # Errors
    /// `ConnectError::InvalidConfig` when `config` fails validation.
    pub fn new(config: AnalyserConfig) -> Result<Self> {
        config.validate()?;

        let n = config.fft_size;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let bins = config.bin_count();

        Ok(Self {
            window: build_blackman_window(n),
            fft,
            fft_buf: vec![Complex::new(0.0, 0.0); n],
            scratch,
            smoothed: vec![0.0; bins],
            magnitudes: vec![0.0; bins],
            config,
        })
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    /// Analyse the most recent `fft_size` samples.
    ///
    /// Shorter input is zero-padded at the front, so the newest sample always
    /// lands at the end of the window.
    pub fn analyse(&mut self, samples: &[f32]) -> &[f32] {
        let n = self.config.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();

        for (i, slot) in self.fft_buf.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.fft_buf, &mut self.scratch);

        let tau = self.config.smoothing_time_constant;
        let scale = 1.0 / n as f32;
        let range = self.config.max_decibels - self.config.min_decibels;

        for k in 0..self.smoothed.len() {
            let mag = self.fft_buf[k].norm() * scale;
            let smoothed = tau * self.smoothed[k] + (1.0 - tau) * mag;
            self.smoothed[k] = smoothed;

            self.magnitudes[k] = if smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                ((db - self.config.min_decibels) / range).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }

        &self.magnitudes
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
        self.magnitudes.iter_mut().for_each(|v| *v = 0.0);
    }
}

fn build_blackman_window(n: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_at_bin(bin: usize, n: usize, amplitude: f32) -> Vec<f32> {
        use std::f32::consts::PI;
        (0..n)
            .map(|i| amplitude * (2.0 * PI * bin as f32 * i as f32 / n as f32).sin())
            .collect()
    }

    #[test]
    fn silence_is_exactly_zero() {
        let mut analyser = SpectrumAnalyser::new(AnalyserConfig::default()).unwrap();
        let out = analyser.analyse(&vec![0.0; 2048]);
        assert_eq!(out.len(), 1024);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(AnalyserConfig::default()).unwrap();
        let samples = sine_at_bin(40, 2048, 0.8);
        let out = analyser.analyse(&samples).to_vec();

        let (peak, _) = out
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak, 40);
        assert!(out[40] > 0.5, "peak={}", out[40]);
        assert!(out[200] < 0.2, "far bin={}", out[200]);
    }

    #[test]
    fn smoothing_ramps_up_over_frames() {
        let config = AnalyserConfig {
            max_decibels: 0.0,
            ..AnalyserConfig::default()
        };
        let mut analyser = SpectrumAnalyser::new(config).unwrap();
        let samples = sine_at_bin(12, 2048, 0.5);

        let first = analyser.analyse(&samples)[12];
        let second = analyser.analyse(&samples)[12];
        assert!(second > first, "first={first} second={second}");

        analyser.reset();
        let after_reset = analyser.analyse(&samples)[12];
        assert!((after_reset - first).abs() < 1e-6);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut analyser = SpectrumAnalyser::new(AnalyserConfig::default()).unwrap();
        let out = analyser.analyse(&[0.0; 100]);
        assert_eq!(out.len(), 1024);
    }

    #[test]
    fn rejects_invalid_configs() {
        let bad_size = AnalyserConfig {
            fft_size: 1000,
            ..AnalyserConfig::default()
        };
        assert!(matches!(
            bad_size.validate(),
            Err(ConnectError::InvalidConfig(_))
        ));

        let bad_db = AnalyserConfig {
            min_decibels: -20.0,
            max_decibels: -30.0,
            ..AnalyserConfig::default()
        };
        assert!(SpectrumAnalyser::new(bad_db).is_err());

        let bad_smoothing = AnalyserConfig {
            smoothing_time_constant: 1.5,
            ..AnalyserConfig::default()
        };
        assert!(bad_smoothing.validate().is_err());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: AnalyserConfig =
            serde_json::from_str(r#"{ "fftSize": 1024 }"#).expect("deserialize config");
        assert_eq!(config.fft_size, 1024);
        assert_eq!(config.smoothing_time_constant, 0.8);
        assert_eq!(config.bin_count(), 512);
    }
}
