//! `LipsyncSession`: lifecycle and per-frame orchestration.
//!
//! ## Lifecycle
//!
//! ```text
//! LipsyncSession::new(source)
//!     └─► connect(input)   → source attached, history cleared, Silence
//!         └─► tick() × N   → one frame analysed per animation frame
//!             └─► disconnect() → source released, history cleared, Silence
//! ```
//!
//! `connect()` on a connected session disconnects first. `disconnect()` is
//! idempotent. Neither is an error in the wrong state.
//!
//! ## Threading
//!
//! The session is driven by the host's render loop, one `tick()` per frame,
//! and never spawns or sleeps. Every method takes `&mut self`; share it by
//! ownership, not across threads.

pub mod pipeline;

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
    error::{AnalysisError, Result},
    features::{FeatureHistory, FeatureSnapshot},
    ipc::events::{FrameKind, VisemeFrame},
    spectrum::{AnalyserConfig, SpectralFrameSource, StreamTapSource},
    viseme::{Viseme, VisemeStabilizer},
};

use pipeline::SessionDiagnostics;

/// Real-time viseme classifier bound to one frame source.
pub struct LipsyncSession<S: SpectralFrameSource> {
    source: S,
    history: FeatureHistory,
    stabilizer: VisemeStabilizer,
    diagnostics: SessionDiagnostics,
    last_frame: Option<VisemeFrame>,
    connected_at: Option<Instant>,
    /// Consecutive ticks without a usable frame.
    missing_streak: u64,
}

impl LipsyncSession<StreamTapSource> {
    /// Session over an [`AudioTap`](crate::buffering::AudioTap) analysed with `config`.
    pub fn with_tap(config: AnalyserConfig) -> Self {
        Self::new(StreamTapSource::new(config))
    }
}

impl<S: SpectralFrameSource> LipsyncSession<S> {
    /// Create a disconnected session in `Silence`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            history: FeatureHistory::new(),
            stabilizer: VisemeStabilizer::new(Instant::now()),
            diagnostics: SessionDiagnostics::default(),
            last_frame: None,
            connected_at: None,
            missing_streak: 0,
        }
    }

    /// Attach to `input`, replacing any previous connection.
    ///
    /// The source taps the input for analysis only and never plays it; the
    /// provider stays responsible for audible output.
    ///
    /// # Errors
    /// Whatever the source reports. The session is left disconnected in
    /// `Silence` and `connect` may be retried.
    pub fn connect(&mut self, input: S::Input) -> Result<()> {
        self.disconnect();

        if let Err(e) = self.source.connect(input) {
            warn!("lipsync connect failed: {e}");
            return Err(e);
        }

        let now = Instant::now();
        self.history.clear();
        self.stabilizer.reset(now);
        self.diagnostics.reset();
        self.missing_streak = 0;
        self.connected_at = Some(now);

        info!(bin_width = self.source.bin_width(), "lipsync session connected");
        Ok(())
    }

    /// Release the source and return to `Silence`. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        let was_connected = self.connected_at.take().is_some();

        self.source.disconnect();
        self.history.clear();
        self.stabilizer.reset(Instant::now());
        self.last_frame = None;
        self.missing_streak = 0;

        if was_connected {
            info!(
                ticks = self.diagnostics.ticks,
                viseme_changes = self.diagnostics.viseme_changes,
                "lipsync session disconnected"
            );
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected_at.is_some() && self.source.is_connected()
    }

    /// Analyse one frame using the wall clock.
    pub fn tick(&mut self) -> Viseme {
        self.tick_at(Instant::now())
    }

    /// Analyse one frame as if it were `now`.
    ///
    /// Replays and tests drive the dwell clock through this. Never fails:
    /// a missing or malformed frame degrades the tick to `Silence`.
    pub fn tick_at(&mut self, now: Instant) -> Viseme {
        self.diagnostics.ticks += 1;
        let seq = self.diagnostics.ticks;

        let bin_width = self.source.bin_width();
        let result = match self.source.next_frame() {
            Some(frame) => pipeline::analyse(frame, bin_width, &mut self.history),
            None => Err(AnalysisError::Unavailable),
        };

        let analysis = match result {
            Ok(analysis) => analysis,
            Err(e) => {
                self.on_analysis_error(e, now);
                if self.connected_at.is_some() {
                    self.last_frame = Some(VisemeFrame::unavailable(seq));
                }
                return Viseme::Silence;
            }
        };

        if self.missing_streak > 0 {
            debug!(missed = self.missing_streak, "frame source recovered");
            self.missing_streak = 0;
        }
        if analysis.kind == FrameKind::Silent {
            self.diagnostics.silent_frames += 1;
        }

        let before = self.stabilizer.current();
        let viseme = self.stabilizer.select(&analysis.scores, now);
        if viseme != before {
            self.diagnostics.viseme_changes += 1;
        }

        self.last_frame = Some(VisemeFrame::scored(
            seq,
            viseme,
            analysis.kind,
            analysis.snapshot.volume,
            analysis.snapshot.centroid,
            &analysis.scores,
        ));
        viseme
    }

    /// Viseme to render this frame. `Silence` while disconnected.
    pub fn current_viseme(&self) -> Viseme {
        if self.connected_at.is_none() {
            return Viseme::Silence;
        }
        self.stabilizer.current()
    }

    /// Report of the most recent tick since `connect`.
    pub fn last_frame(&self) -> Option<&VisemeFrame> {
        self.last_frame.as_ref()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.diagnostics
    }

    /// Mean of the snapshots currently in history.
    pub fn averaged_features(&self) -> FeatureSnapshot {
        self.history.averaged()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn on_analysis_error(&mut self, err: AnalysisError, now: Instant) {
        self.diagnostics.record_error(err);

        if self.stabilizer.current() != Viseme::Silence {
            self.stabilizer.reset(now);
            self.diagnostics.viseme_changes += 1;
        }

        // Ticking while disconnected is normal for a render loop.
        if self.connected_at.is_none() {
            return;
        }

        self.missing_streak += 1;
        if self.missing_streak == 1 {
            warn!("spectrum unavailable, holding Silence: {err}");
        } else {
            debug!(streak = self.missing_streak, "spectrum unavailable: {err}");
        }
    }
}

impl<S: SpectralFrameSource> Drop for LipsyncSession<S> {
    fn drop(&mut self) {
        self.source.disconnect();
    }
}
