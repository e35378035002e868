use thiserror::Error;

/// All errors produced by firstream-core.
#[derive(Debug, Error)]
pub enum FirStreamError {
    #[error("invalid kernel parameters: length={length}, decay_rate={decay_rate}")]
    InvalidKernelParameters { length: usize, decay_rate: f64 },

    #[error("invalid block size: expected {expected} frames, got {actual}")]
    InvalidBlockSize { expected: usize, actual: usize },

    #[error("block size must be positive")]
    ZeroBlockSize,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("pipeline dropped before the stream completed")]
    PipelineDropped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for FirStreamError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => FirStreamError::Io(e),
            other => FirStreamError::Decode(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, FirStreamError>;
