//! `SpectralFrameSource` over an [`AudioTap`].

use tracing::{debug, info};

use crate::{
    buffering::AudioTap,
    error::{ConnectError, Result},
};

use super::{AnalyserConfig, SpectralFrameSource, SpectrumAnalyser};

/// Highest frequency the classifier looks at; the tap must resolve it.
const MIN_SAMPLE_RATE: u32 = 16_000;

/// Samples drained from the ring per `read` call.
const DRAIN_CHUNK: usize = 1024;

/// Polls without new samples that still re-analyse the held window.
///
/// A render loop can outpace the provider's block size for a frame or two.
/// Past this the tap counts as stalled and `next_frame` yields `None`.
pub const STALL_GRACE_POLLS: u32 = 3;

/// Analyses whatever the provider wrote into the tap since the last frame.
///
/// Keeps the most recent `fft_size` samples in a circular window, so a
/// frame can always be produced even when fewer new samples arrived than
/// one transform needs. A tap that stops receiving samples yields `None`
/// after [`STALL_GRACE_POLLS`] polls instead of replaying stale audio.
pub struct StreamTapSource {
    config: AnalyserConfig,
    tap: Option<AudioTap>,
    analyser: Option<SpectrumAnalyser>,
    /// Circular time-domain window, `fft_size` long.
    window: Vec<f32>,
    /// Next write position in `window`.
    write_pos: usize,
    /// `window` unrolled oldest → newest for the analyser.
    ordered: Vec<f32>,
    scratch: Vec<f32>,
    bin_width: f32,
    /// Consecutive polls that drained nothing.
    stale_polls: u32,
}

impl StreamTapSource {
    pub fn new(config: AnalyserConfig) -> Self {
        Self {
            config,
            tap: None,
            analyser: None,
            window: Vec::new(),
            write_pos: 0,
            ordered: Vec::new(),
            scratch: vec![0.0; DRAIN_CHUNK],
            bin_width: 0.0,
            stale_polls: 0,
        }
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    /// Move everything pending in the tap into the window. Returns the
    /// number of samples moved.
    fn drain_tap(&mut self) -> usize {
        let Some(tap) = self.tap.as_mut() else {
            return 0;
        };
        let len = self.window.len();
        let mut drained = 0;
        loop {
            let n = tap.read(&mut self.scratch);
            if n == 0 {
                break;
            }
            for &s in &self.scratch[..n] {
                self.window[self.write_pos] = s;
                self.write_pos = (self.write_pos + 1) % len;
            }
            drained += n;
        }
        drained
    }
}

impl Default for StreamTapSource {
    fn default() -> Self {
        Self::new(AnalyserConfig::default())
    }
}

impl SpectralFrameSource for StreamTapSource {
    type Input = AudioTap;

    /// Take the reader side of a tap. The writer stays with the provider,
    /// which remains the only party that plays the audio.
    fn connect(&mut self, input: AudioTap) -> Result<()> {
        self.disconnect();

        let sample_rate = input.sample_rate();
        if sample_rate < MIN_SAMPLE_RATE {
            return Err(ConnectError::IncompatibleInput(format!(
                "sample rate {sample_rate} Hz cannot resolve 8000 Hz \
                 (need ≥ {MIN_SAMPLE_RATE} Hz)"
            )));
        }

        let analyser = SpectrumAnalyser::new(self.config.clone())?;
        let n = self.config.fft_size;

        self.window = vec![0.0; n];
        self.ordered = vec![0.0; n];
        self.write_pos = 0;
        self.stale_polls = 0;
        self.bin_width = sample_rate as f32 / n as f32;
        self.analyser = Some(analyser);
        self.tap = Some(input);

        info!(
            sample_rate,
            fft_size = n,
            bin_width = self.bin_width,
            "stream tap connected"
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Option<&[f32]> {
        if self.tap.is_none() {
            return None;
        }
        if self.drain_tap() > 0 {
            self.stale_polls = 0;
        } else {
            self.stale_polls = self.stale_polls.saturating_add(1);
            if self.stale_polls > STALL_GRACE_POLLS {
                if self.stale_polls == STALL_GRACE_POLLS + 1 {
                    debug!(polls = self.stale_polls, "stream tap stalled");
                }
                return None;
            }
        }

        let split = self.write_pos;
        let tail = self.window.len() - split;
        self.ordered[..tail].copy_from_slice(&self.window[split..]);
        self.ordered[tail..].copy_from_slice(&self.window[..split]);

        let analyser = self.analyser.as_mut()?;
        Some(analyser.analyse(&self.ordered))
    }

    fn disconnect(&mut self) {
        if self.tap.take().is_some() {
            debug!("stream tap disconnected");
        }
        self.analyser = None;
        self.window.clear();
        self.ordered.clear();
        self.write_pos = 0;
        self.stale_polls = 0;
        self.bin_width = 0.0;
    }

    fn is_connected(&self) -> bool {
        self.tap.is_some()
    }

    fn bin_width(&self) -> f32 {
        self.bin_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq_hz: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        use std::f32::consts::PI;
        (0..len)
            .map(|i| 0.6 * (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn disconnected_source_yields_nothing() {
        let mut source = StreamTapSource::default();
        assert!(!source.is_connected());
        assert!(source.next_frame().is_none());
        source.disconnect();
        source.disconnect();
        assert!(!source.is_connected());
    }

    #[test]
    fn rejects_low_sample_rates() {
        let mut source = StreamTapSource::default();
        let (_writer, tap) = AudioTap::new(8_000);
        let err = source.connect(tap).unwrap_err();
        assert!(matches!(err, ConnectError::IncompatibleInput(_)));
        assert!(!source.is_connected());
    }

    #[test]
    fn rejects_invalid_analyser_config() {
        let mut source = StreamTapSource::new(AnalyserConfig {
            fft_size: 3000,
            ..AnalyserConfig::default()
        });
        let (_writer, tap) = AudioTap::new(48_000);
        assert!(matches!(
            source.connect(tap),
            Err(ConnectError::InvalidConfig(_))
        ));
        assert!(!source.is_connected());
    }

    #[test]
    fn silent_tap_produces_zero_frames() {
        let mut source = StreamTapSource::default();
        let (_writer, tap) = AudioTap::new(48_000);
        source.connect(tap).unwrap();
        assert!((source.bin_width() - 48_000.0 / 2048.0).abs() < 1e-4);

        let frame = source.next_frame().expect("connected source yields a frame");
        assert_eq!(frame.len(), 1024);
        assert!(frame.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn tone_energy_lands_near_its_bin() {
        let sample_rate = 48_000;
        let mut source = StreamTapSource::default();
        let (mut writer, tap) = AudioTap::new(sample_rate);
        source.connect(tap).unwrap();

        writer.write(&tone(1500.0, sample_rate, 4096));
        let frame = source.next_frame().unwrap().to_vec();

        let expected_bin = (1500.0 / source.bin_width()).round() as usize;
        let (peak, _) = frame
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert!(
            (peak as isize - expected_bin as isize).abs() <= 1,
            "peak={peak} expected≈{expected_bin}"
        );
    }

    #[test]
    fn stalled_tap_stops_yielding_frames() {
        let sample_rate = 48_000;
        let mut source = StreamTapSource::default();
        let (mut writer, tap) = AudioTap::new(sample_rate);
        source.connect(tap).unwrap();

        writer.write(&tone(1200.0, sample_rate, 4096));
        assert!(source.next_frame().is_some());

        for _ in 0..STALL_GRACE_POLLS {
            assert!(source.next_frame().is_some());
        }
        for _ in 0..600 {
            assert!(source.next_frame().is_none());
        }
        assert!(source.is_connected());

        // New samples resume analysis.
        writer.write(&tone(1200.0, sample_rate, 800));
        assert!(source.next_frame().is_some());
    }

    #[test]
    fn reconnect_starts_from_an_empty_window() {
        let sample_rate = 48_000;
        let mut source = StreamTapSource::default();
        let (mut writer, tap) = AudioTap::new(sample_rate);
        source.connect(tap).unwrap();
        writer.write(&tone(800.0, sample_rate, 2048));
        assert!(source.next_frame().unwrap().iter().any(|&v| v > 0.0));

        let (_writer2, tap2) = AudioTap::new(sample_rate);
        source.connect(tap2).unwrap();
        assert!(source.next_frame().unwrap().iter().all(|&v| v == 0.0));
    }
}
