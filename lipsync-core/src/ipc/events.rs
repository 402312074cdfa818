//! Per-tick report types.

use serde::{Deserialize, Serialize};

use crate::viseme::{ScoreTable, Viseme, VISEME_COUNT};

/// How the tick that produced a `VisemeFrame` obtained its features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// A spectrum with energy was analysed and scored.
    Analysed,
    /// The spectrum was silent; scored but kept out of history.
    Silent,
    /// No usable spectrum; the tick was forced to `Silence`.
    Unavailable,
}

/// Snapshot of one completed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisemeFrame {
    /// Ticks since the session connected, starting at 1.
    pub seq: u64,
    /// Stabilized viseme after this tick.
    pub viseme: Viseme,
    pub kind: FrameKind,
    /// Current-frame volume (mean band energy).
    pub volume: f32,
    /// Current-frame spectral centroid in Hz.
    pub centroid: f32,
    /// Raw scores in `Viseme::ALL` order, before dwell weighting.
    pub scores: [f32; VISEME_COUNT],
}

impl VisemeFrame {
    pub fn unavailable(seq: u64) -> Self {
        Self {
            seq,
            viseme: Viseme::Silence,
            kind: FrameKind::Unavailable,
            volume: 0.0,
            centroid: 0.0,
            scores: [0.0; VISEME_COUNT],
        }
    }

    pub fn score(&self, viseme: Viseme) -> f32 {
        self.scores[viseme.index()]
    }

    pub(crate) fn scored(
        seq: u64,
        viseme: Viseme,
        kind: FrameKind,
        volume: f32,
        centroid: f32,
        scores: &ScoreTable,
    ) -> Self {
        Self {
            seq,
            viseme,
            kind,
            volume,
            centroid,
            scores: *scores.as_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viseme_frame_serializes_with_camel_case_and_rig_names() {
        let mut scores = ScoreTable::new();
        scores.set(Viseme::AA, 0.8);
        let frame = VisemeFrame::scored(12, Viseme::AA, FrameKind::Analysed, 0.31, 1450.0, &scores);

        let json = serde_json::to_value(&frame).expect("serialize viseme frame");
        assert_eq!(json["seq"], 12);
        assert_eq!(json["viseme"], "aa");
        assert_eq!(json["kind"], "analysed");
        let scores_json = json["scores"].as_array().expect("scores serialize as array");
        assert_eq!(scores_json.len(), VISEME_COUNT);
        let aa = scores_json[Viseme::AA.index()]
            .as_f64()
            .expect("score should serialize as number");
        assert!((aa - 0.8).abs() < 1e-6);

        let round_trip: VisemeFrame =
            serde_json::from_value(json).expect("deserialize viseme frame");
        assert_eq!(round_trip.viseme, Viseme::AA);
        assert_eq!(round_trip.score(Viseme::AA), 0.8);
    }

    #[test]
    fn unavailable_frame_is_silent() {
        let frame = VisemeFrame::unavailable(3);
        assert_eq!(frame.viseme, Viseme::Silence);
        assert_eq!(frame.kind, FrameKind::Unavailable);

        let json = serde_json::to_value(&frame).expect("serialize frame");
        assert_eq!(json["kind"], "unavailable");
        assert_eq!(json["viseme"], "sil");
    }

    #[test]
    fn frame_kind_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<FrameKind>(r#""Silent""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
