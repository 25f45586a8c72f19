//! Capture error types

use thiserror::Error;

/// Errors raised while opening, running or closing a capture stream
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The audio host cannot capture what an output device is playing.
    /// The message doubles as the reason code reported to callers.
    #[error("wasapi_loopback_unsupported")]
    LoopbackUnsupported,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Writer thread for {0} panicked")]
    WriterPanicked(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
