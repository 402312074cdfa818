use thiserror::Error;

/// Errors raised while attaching a session to an audio input.
///
/// All variants are recoverable: the session stays disconnected in `Silence`
/// and the caller may retry.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("no audio input device found")]
    NoInputDevice,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("incompatible audio input: {0}")]
    IncompatibleInput(String),

    #[error("invalid analyser config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-tick analysis failures. Handled inside `tick()`, never propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("frame source produced no data")]
    Unavailable,

    #[error("frame source produced an empty frame")]
    EmptyFrame,

    #[error("non-finite magnitude at bin {bin}")]
    NonFinite { bin: usize },
}

pub type Result<T> = std::result::Result<T, ConnectError>;
