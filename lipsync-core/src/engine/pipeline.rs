//! One tick of the classifier, minus the stabilizer.
//!
//! ## Stages
//!
//! ```text
//! 1. Validate the magnitude frame (non-empty, finite)
//! 2. extract() → FeatureSnapshot
//! 3. Deltas against the entry one step behind the newest in history
//! 4. Push into history; a silent frame empties it instead
//! 5. Average history → score()
//! ```

use serde::Serialize;

use crate::{
    error::AnalysisError,
    features::{extract, FeatureHistory, FeatureSnapshot, BANDS, BAND_COUNT},
    ipc::events::FrameKind,
    viseme::{score, ScoreTable},
};

/// Counters for one connection. Reset on every `connect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDiagnostics {
    pub ticks: u64,
    /// Ticks where the source had no frame (underrun or disconnected).
    pub frames_missing: u64,
    /// Frames discarded as empty or non-finite.
    pub frames_rejected: u64,
    /// Frames with zero energy; each one empties history.
    pub silent_frames: u64,
    pub viseme_changes: u64,
}

impl SessionDiagnostics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn record_error(&mut self, err: AnalysisError) {
        match err {
            AnalysisError::Unavailable => self.frames_missing += 1,
            AnalysisError::EmptyFrame | AnalysisError::NonFinite { .. } => {
                self.frames_rejected += 1
            }
        }
    }
}

/// Everything the stabilizer and the report need from one frame.
#[derive(Debug, Clone, Copy)]
pub struct Analysis {
    pub snapshot: FeatureSnapshot,
    pub averaged: FeatureSnapshot,
    pub volume_delta: f32,
    pub centroid_delta: f32,
    pub scores: ScoreTable,
    pub kind: FrameKind,
}

/// Reject frames the extractor cannot make sense of.
pub fn validate_frame(frame: &[f32]) -> Result<(), AnalysisError> {
    if frame.is_empty() {
        return Err(AnalysisError::EmptyFrame);
    }
    if let Some(bin) = frame.iter().position(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite { bin });
    }
    Ok(())
}

/// Run stages 1–5 for one frame, updating `history`.
///
/// # Errors
/// `AnalysisError` for frames that fail validation; `history` is untouched.
pub fn analyse(
    frame: &[f32],
    bin_width: f32,
    history: &mut FeatureHistory,
) -> Result<Analysis, AnalysisError> {
    validate_frame(frame)?;

    let mut snapshot = extract(frame, &BANDS, bin_width);

    let (volume_delta, centroid_delta) = match history.previous(1) {
        Some(prev) => {
            for i in 0..BAND_COUNT {
                snapshot.delta_bands[i] = snapshot.bands[i] - prev.bands[i];
            }
            (
                (snapshot.volume - prev.volume).abs(),
                (snapshot.centroid - prev.centroid).abs(),
            )
        }
        None => (0.0, 0.0),
    };

    // True silence drops the speech average so the next utterance starts fresh.
    let kind = if snapshot.is_silent() {
        history.clear();
        FrameKind::Silent
    } else {
        history.push(snapshot);
        FrameKind::Analysed
    };

    let averaged = history.averaged();
    let scores = score(&snapshot, &averaged, volume_delta, centroid_delta);

    Ok(Analysis {
        snapshot,
        averaged,
        volume_delta,
        centroid_delta,
        scores,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viseme::Viseme;
    use approx::assert_abs_diff_eq;

    const BIN_WIDTH: f32 = 48_000.0 / 2048.0;

    fn frame_with(bin: usize, level: f32) -> Vec<f32> {
        let mut frame = vec![0.0f32; 1024];
        frame[bin] = level;
        frame
    }

    #[test]
    fn rejects_empty_and_non_finite_frames() {
        let mut history = FeatureHistory::new();
        assert_eq!(
            analyse(&[], BIN_WIDTH, &mut history).unwrap_err(),
            AnalysisError::EmptyFrame
        );

        let mut frame = frame_with(10, 0.5);
        frame[20] = f32::NAN;
        assert_eq!(
            analyse(&frame, BIN_WIDTH, &mut history).unwrap_err(),
            AnalysisError::NonFinite { bin: 20 }
        );
        assert!(history.is_empty());
    }

    #[test]
    fn silent_frames_stay_out_of_history() {
        let mut history = FeatureHistory::new();
        let analysis = analyse(&[0.0; 1024], BIN_WIDTH, &mut history).unwrap();
        assert_eq!(analysis.kind, FrameKind::Silent);
        assert!(history.is_empty());
        assert_eq!(analysis.scores[Viseme::Silence], 1.0);
    }

    #[test]
    fn silent_frame_empties_history_after_speech() {
        let mut history = FeatureHistory::new();
        for _ in 0..5 {
            analyse(&frame_with(13, 0.9), BIN_WIDTH, &mut history).unwrap();
        }
        assert_eq!(history.len(), 5);

        let analysis = analyse(&[0.0; 1024], BIN_WIDTH, &mut history).unwrap();
        assert_eq!(analysis.kind, FrameKind::Silent);
        assert!(history.is_empty());
        assert_eq!(analysis.averaged, FeatureSnapshot::default());
        assert_eq!(analysis.scores[Viseme::Silence], 1.0);
    }

    #[test]
    fn deltas_need_two_entries() {
        let mut history = FeatureHistory::new();

        let first = analyse(&frame_with(13, 0.6), BIN_WIDTH, &mut history).unwrap();
        assert_eq!(first.volume_delta, 0.0);
        assert_eq!(first.snapshot.delta_bands, [0.0; BAND_COUNT]);

        // One entry in history: still no reference at offset 1.
        let second = analyse(&frame_with(100, 0.9), BIN_WIDTH, &mut history).unwrap();
        assert_eq!(second.centroid_delta, 0.0);

        // Two entries: compares against the older one (bin 13).
        let third = analyse(&frame_with(100, 0.9), BIN_WIDTH, &mut history).unwrap();
        assert_abs_diff_eq!(
            third.centroid_delta,
            (100.0 - 13.0) * BIN_WIDTH,
            epsilon = 1e-2
        );
        assert!(third.snapshot.delta_bands[1] < 0.0);
        assert!(third.snapshot.delta_bands[4] > 0.0);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn diagnostics_split_missing_and_rejected() {
        let mut diagnostics = SessionDiagnostics::default();
        diagnostics.record_error(AnalysisError::Unavailable);
        diagnostics.record_error(AnalysisError::NonFinite { bin: 1 });
        diagnostics.record_error(AnalysisError::EmptyFrame);
        assert_eq!(diagnostics.frames_missing, 1);
        assert_eq!(diagnostics.frames_rejected, 2);

        diagnostics.reset();
        assert_eq!(diagnostics, SessionDiagnostics::default());
    }
}
