//! Frequency-domain frame sources.
//!
//! The `SpectralFrameSource` trait is the seam between platform audio and the
//! classifier: swap in `StreamTapSource` (a provider-fed tap), `CaptureSource`
//! (cpal input device) or a scripted source in tests without touching the
//! scoring code.

pub mod analyser;
pub mod tap;

pub use analyser::{AnalyserConfig, SpectrumAnalyser};
pub use tap::StreamTapSource;

use crate::error::Result;

/// Reference transform size.
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Produces one magnitude spectrum per call, values normalized to `0..=1`.
///
/// # Audio-silent contract
///
/// `connect` attaches to the input for **analysis only**. An implementation
/// must never route the input to a speaker or any other output device: the
/// provider is already playing that audio, and a second route would double
/// the playback.
pub trait SpectralFrameSource {
    /// Whatever the source needs to attach to a live input.
    type Input;

    /// Attach to `input`, resuming a paused input stream if necessary.
    ///
    /// # Errors
    /// Device, permission and compatibility failures. The source stays
    /// disconnected and the caller may retry.
    fn connect(&mut self, input: Self::Input) -> Result<()>;

    /// Next magnitude frame, or `None` while disconnected or starved.
    fn next_frame(&mut self) -> Option<&[f32]>;

    /// Release every resource. Safe to call repeatedly.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Width of one frequency bin in Hz (`sample_rate / fft_size`).
    fn bin_width(&self) -> f32;
}
