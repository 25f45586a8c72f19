//! Audio capture
//!
//! Platform-agnostic capture seams, the cpal-backed implementation, and the
//! WAV writer that persists captured audio.

pub mod cpal_backend;
pub mod error;
pub mod traits;
pub mod wav;

#[cfg(test)]
pub(crate) mod testing;

pub use cpal_backend::CpalBackend;
pub use error::{CaptureError, CaptureResult};
pub use traits::{
    ActiveStream, AudioBackend, AudioDeviceInfo, CaptureFormat, ChannelRole, StreamRequest,
};
pub use wav::{FrameSink, WavFileWriter, WavStats};
