//! Per-frame spectral features.
//!
//! ## Bands
//!
//! | # | Range (Hz)  | Region                     |
//! |---|-------------|----------------------------|
//! | 0 | 50–200      | sub-formant                |
//! | 1 | 200–500     | first formant (low)        |
//! | 2 | 500–1000    | first formant (high)       |
//! | 3 | 1000–2000   | second formant             |
//! | 4 | 2000–3500   | third formant              |
//! | 5 | 3500–5500   | fricative                  |
//! | 6 | 5500–8000   | high-frequency / sibilance |

pub mod history;

pub use history::FeatureHistory;

use serde::{Deserialize, Serialize};

pub const BAND_COUNT: usize = 7;

/// Half-open frequency range `[low_hz, high_hz)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyBand {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl FrequencyBand {
    pub const fn new(low_hz: f32, high_hz: f32) -> Self {
        Self { low_hz, high_hz }
    }
}

/// Contiguous, non-overlapping, ordered low → high.
pub const BANDS: [FrequencyBand; BAND_COUNT] = [
    FrequencyBand::new(50.0, 200.0),
    FrequencyBand::new(200.0, 500.0),
    FrequencyBand::new(500.0, 1_000.0),
    FrequencyBand::new(1_000.0, 2_000.0),
    FrequencyBand::new(2_000.0, 3_500.0),
    FrequencyBand::new(3_500.0, 5_500.0),
    FrequencyBand::new(5_500.0, 8_000.0),
];

/// Compact description of one analysis frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSnapshot {
    /// Mean normalized magnitude per band, `0..=1`.
    pub bands: [f32; BAND_COUNT],
    /// `bands` minus the snapshot one step back in history.
    pub delta_bands: [f32; BAND_COUNT],
    /// Mean of `bands`.
    pub volume: f32,
    /// Energy-weighted mean frequency over the whole spectrum (Hz).
    pub centroid: f32,
    /// Sum of every bin. Zero means a silent frame.
    pub energy: f32,
}

impl FeatureSnapshot {
    pub fn is_silent(&self) -> bool {
        self.energy <= 0.0
    }
}

/// Reduce one magnitude frame to a `FeatureSnapshot`.
///
/// Bin `i` sits at `i * bin_width` Hz. `delta_bands` is left at zero; it
/// depends on history and is filled in by the session.
pub fn extract(
    frame: &[f32],
    bands: &[FrequencyBand; BAND_COUNT],
    bin_width: f32,
) -> FeatureSnapshot {
    let mut snapshot = FeatureSnapshot::default();
    if frame.is_empty() || bin_width <= 0.0 {
        return snapshot;
    }

    for (value, band) in snapshot.bands.iter_mut().zip(bands) {
        *value = band_mean(frame, band, bin_width);
    }
    snapshot.volume = snapshot.bands.iter().sum::<f32>() / BAND_COUNT as f32;

    let mut energy = 0.0f32;
    let mut weighted = 0.0f32;
    for (i, &e) in frame.iter().enumerate() {
        energy += e;
        weighted += i as f32 * bin_width * e;
    }
    snapshot.energy = energy;
    snapshot.centroid = if energy > 0.0 { weighted / energy } else { 0.0 };

    snapshot
}

/// Mean of the bins whose centre frequency falls in `[low, high)`.
fn band_mean(frame: &[f32], band: &FrequencyBand, bin_width: f32) -> f32 {
    let start = ((band.low_hz / bin_width).ceil() as usize).min(frame.len());
    let end = ((band.high_hz / bin_width).ceil() as usize).min(frame.len());
    if end <= start {
        return 0.0;
    }
    let bins = &frame[start..end];
    bins.iter().sum::<f32>() / bins.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const BIN_WIDTH: f32 = 48_000.0 / 2048.0;

    #[test]
    fn bands_partition_50_to_8000() {
        assert_eq!(BANDS[0].low_hz, 50.0);
        assert_eq!(BANDS[BAND_COUNT - 1].high_hz, 8_000.0);
        for band in &BANDS {
            assert!(band.low_hz < band.high_hz);
        }
        for pair in BANDS.windows(2) {
            assert_eq!(pair[0].high_hz, pair[1].low_hz);
        }
    }

    #[test]
    fn silent_frame_has_zero_features() {
        let snapshot = extract(&[0.0; 1024], &BANDS, BIN_WIDTH);
        assert_eq!(snapshot.volume, 0.0);
        assert_eq!(snapshot.centroid, 0.0);
        assert!(snapshot.is_silent());
    }

    #[test]
    fn single_bin_sets_centroid_and_band() {
        let mut frame = vec![0.0f32; 1024];
        // 300 Hz / 23.4375 ≈ bin 12.8 → bin 13 sits at 304.7 Hz, inside band 1.
        frame[13] = 0.7;
        let snapshot = extract(&frame, &BANDS, BIN_WIDTH);

        assert_abs_diff_eq!(snapshot.centroid, 13.0 * BIN_WIDTH, epsilon = 1e-3);
        assert!(snapshot.bands[1] > 0.0);
        for (i, &b) in snapshot.bands.iter().enumerate() {
            if i != 1 {
                assert_eq!(b, 0.0, "band {i}");
            }
        }
        assert_abs_diff_eq!(
            snapshot.volume,
            snapshot.bands[1] / BAND_COUNT as f32,
            epsilon = 1e-6
        );
    }

    #[test]
    fn band_value_is_mean_of_its_bins() {
        let frame = vec![0.5f32; 1024];
        let snapshot = extract(&frame, &BANDS, BIN_WIDTH);
        for &b in &snapshot.bands {
            assert_abs_diff_eq!(b, 0.5, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(snapshot.volume, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn bands_beyond_the_frame_are_zero() {
        // 64 bins at 23.4 Hz stop near 1500 Hz, inside band 3.
        let frame = vec![1.0f32; 64];
        let snapshot = extract(&frame, &BANDS, BIN_WIDTH);
        assert_eq!(snapshot.bands[5], 0.0);
        assert_eq!(snapshot.bands[6], 0.0);
        assert!(snapshot.bands[3] > 0.0);
    }

    #[test]
    fn centroid_includes_bins_outside_the_bands() {
        let mut frame = vec![0.0f32; 1024];
        // ~11 kHz, above every band.
        frame[480] = 1.0;
        let snapshot = extract(&frame, &BANDS, BIN_WIDTH);
        assert_eq!(snapshot.volume, 0.0);
        assert_abs_diff_eq!(snapshot.centroid, 480.0 * BIN_WIDTH, epsilon = 1e-2);
        assert!(!snapshot.is_silent());
    }
}
