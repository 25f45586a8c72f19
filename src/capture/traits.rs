//! Capture trait definitions
//!
//! Platform-agnostic seams between the recorder and the audio host.

use super::error::CaptureResult;
use super::wav::FrameSink;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which audio source a capture channel represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    /// Default input device
    Mic,
    /// Loopback of the default output device
    System,
}

impl ChannelRole {
    /// File name used for this role inside a call's recording directory
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Mic => "mic.wav",
            Self::System => "system.wav",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mic => "mic",
            Self::System => "system",
        }
    }

    /// Whether `name` is one of the recording file names
    pub fn is_recording_file(name: &str) -> bool {
        [Self::Mic, Self::System]
            .iter()
            .any(|role| role.file_name() == name)
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Identifier used to reopen the device
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is an input device
    pub is_input: bool,

    /// Default sample rate in Hz
    pub default_sample_rate: u32,

    /// Highest channel count the device reports
    pub max_channels: u16,
}

/// PCM layout of a capture stream and its output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Everything an [`AudioBackend`] needs to open one stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub role: ChannelRole,
    pub device_id: String,
    pub format: CaptureFormat,
    pub loopback: bool,
}

/// A running hardware stream
///
/// Dropping the stream must release the device even if `stop` was never called.
pub trait ActiveStream: Send {
    /// Stop the stream and release the device
    fn stop(&mut self) -> CaptureResult<()>;
}

/// Audio host the recorder opens streams on
pub trait AudioBackend: Send + Sync {
    /// Resolve the default input device and its capabilities
    fn default_input_device(&self) -> CaptureResult<AudioDeviceInfo>;

    /// Resolve the default output device and its capabilities
    fn default_output_device(&self) -> CaptureResult<AudioDeviceInfo>;

    /// Whether output devices can be captured in loopback mode on this host
    fn supports_loopback(&self) -> bool;

    /// Open and start a stream that delivers interleaved `f32` frames to `sink`
    fn open_stream(
        &self,
        request: &StreamRequest,
        sink: FrameSink,
    ) -> CaptureResult<Box<dyn ActiveStream>>;
}
