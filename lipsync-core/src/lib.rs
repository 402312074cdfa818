//! # lipsync-core
//!
//! Real-time viseme classifier for audio-driven avatar lip-sync.
//!
//! ## Architecture
//!
//! ```text
//! Audio provider ─► TapWriter ─► SPSC ring ─► StreamTapSource (rustfft)
//!                                                  │ magnitude frame
//!                                            extract() → FeatureSnapshot
//!                                                  │
//!                                            FeatureHistory (10 frames)
//!                                                  │
//!                                            score() → ScoreTable
//!                                                  │
//!                                            VisemeStabilizer → Viseme
//! ```
//!
//! `LipsyncSession::tick()` runs the whole chain once per animation frame on
//! the caller's thread. No thread, timer or output stream is ever created by
//! the classifier.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod features;
pub mod ipc;
pub mod spectrum;
pub mod viseme;

// Convenience re-exports for downstream crates
pub use buffering::{AudioTap, TapWriter};
pub use engine::{pipeline::SessionDiagnostics, LipsyncSession};
pub use error::{AnalysisError, ConnectError};
pub use features::{FeatureHistory, FeatureSnapshot, FrequencyBand, BANDS};
pub use ipc::events::{FrameKind, VisemeFrame};
pub use spectrum::{AnalyserConfig, SpectralFrameSource, StreamTapSource};
pub use viseme::{Category, ScoreTable, Viseme, VisemeStabilizer};

pub use audio::{CaptureConfig, DeviceRole};

#[cfg(feature = "audio-cpal")]
pub use audio::CaptureSource;
