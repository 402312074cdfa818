//! Hysteresis over the raw score table.
//!
//! The viseme currently held gets its score multiplied by a dwell-dependent
//! factor before the `argmax`:
//!
//! ```text
//! 1.3 ─────────┐
//!              └──┐  linear to 1.0
//! 1.0             └──┐
//!                    └───────  1 − (t − 200 ms) / 1 s
//! 0.5                       └────────────── floor
//!     0      100    200    700             ms
//! ```
//!
//! A fresh choice is reinforced so frame noise cannot flip it; a stale one
//! is gradually penalised so the mouth does not freeze on a held shape.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{ScoreTable, Viseme};

/// Full reinforcement lasts this long after a change.
pub const HOLD_WINDOW: Duration = Duration::from_millis(100);
/// Reinforcement fades to neutral over this extra window.
pub const FADE_WINDOW: Duration = Duration::from_millis(100);
/// Past `HOLD_WINDOW + FADE_WINDOW` the multiplier loses 1.0 per this span.
pub const RELEASE_SPAN: Duration = Duration::from_millis(1_000);

const HOLD_BOOST: f32 = 1.3;
const RELEASE_FLOOR: f32 = 0.5;

/// Multiplier applied to the held viseme after it has been held for `elapsed`.
pub fn dwell_multiplier(elapsed: Duration) -> f32 {
    let hold = HOLD_WINDOW.as_secs_f32();
    let fade_end = hold + FADE_WINDOW.as_secs_f32();
    let t = elapsed.as_secs_f32();

    if t <= hold {
        HOLD_BOOST
    } else if t <= fade_end {
        let progress = (t - hold) / FADE_WINDOW.as_secs_f32();
        HOLD_BOOST - (HOLD_BOOST - 1.0) * progress
    } else {
        (1.0 - (t - fade_end) / RELEASE_SPAN.as_secs_f32()).max(RELEASE_FLOOR)
    }
}

#[derive(Debug, Clone)]
pub struct VisemeStabilizer {
    current: Viseme,
    dwell_start: Instant,
}

impl VisemeStabilizer {
    /// Start in `Silence`, dwelling since `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            current: Viseme::Silence,
            dwell_start: now,
        }
    }

    pub fn current(&self) -> Viseme {
        self.current
    }

    pub fn dwell_start(&self) -> Instant {
        self.dwell_start
    }

    /// How long the current viseme has been held at `now`.
    pub fn dwell(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.dwell_start)
    }

    /// Back to `Silence`, dwelling since `now`.
    pub fn reset(&mut self, now: Instant) {
        self.current = Viseme::Silence;
        self.dwell_start = now;
    }

    /// Pick the winner of `scores` at `now` and update the held viseme.
    ///
    /// Ties go to the first maximum in declaration order. The dwell clock
    /// restarts only when the winner changes.
    pub fn select(&mut self, scores: &ScoreTable, now: Instant) -> Viseme {
        let dwell = self.dwell(now);
        let multiplier = dwell_multiplier(dwell);

        let mut winner = Viseme::Silence;
        let mut best = f32::NEG_INFINITY;
        for (viseme, raw) in scores.iter() {
            let adjusted = if viseme == self.current {
                raw * multiplier
            } else {
                raw
            };
            if adjusted > best {
                best = adjusted;
                winner = viseme;
            }
        }

        if winner != self.current {
            debug!(
                from = %self.current,
                to = %winner,
                dwell_ms = dwell.as_millis() as u64,
                "viseme changed"
            );
            self.current = winner;
            self.dwell_start = now;
        }

        self.current
    }
}
