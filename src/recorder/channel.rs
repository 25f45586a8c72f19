//! Capture channel
//!
//! One hardware stream feeding one WAV file.

use crate::capture::{
    ActiveStream, AudioBackend, AudioDeviceInfo, CaptureError, CaptureFormat, CaptureResult,
    ChannelRole, StreamRequest, WavFileWriter,
};
use std::path::{Path, PathBuf};

/// Static parameters of a channel, resolved before it starts
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub role: ChannelRole,
    pub path: PathBuf,
    pub device_id: String,
    pub format: CaptureFormat,
    pub loopback: bool,
    pub queue_capacity: usize,
}

impl ChannelConfig {
    /// Build a channel config for `device`, capping its channel count at `max_channels`
    pub fn for_device(
        role: ChannelRole,
        path: PathBuf,
        device: &AudioDeviceInfo,
        max_channels: u16,
        queue_capacity: usize,
    ) -> Self {
        Self {
            role,
            path,
            device_id: device.id.clone(),
            format: CaptureFormat {
                sample_rate: device.default_sample_rate,
                channels: device.max_channels.clamp(1, max_channels.max(1)),
            },
            loopback: role == ChannelRole::System,
            queue_capacity,
        }
    }
}

/// A single capture stream and the file it writes to
pub struct CaptureChannel {
    config: ChannelConfig,
    stream: Option<Box<dyn ActiveStream>>,
    writer: Option<WavFileWriter>,
}

impl CaptureChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            stream: None,
            writer: None,
        }
    }

    pub fn role(&self) -> ChannelRole {
        self.config.role
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the output file and start streaming into it
    ///
    /// On failure nothing stays open and the partially written file is removed.
    pub fn start(&mut self, backend: &dyn AudioBackend) -> CaptureResult<()> {
        if self.is_running() {
            return Ok(());
        }

        if self.config.loopback && !backend.supports_loopback() {
            return Err(CaptureError::LoopbackUnsupported);
        }

        let writer = WavFileWriter::create(
            &self.config.path,
            self.config.format,
            self.config.queue_capacity,
        )?;

        let request = StreamRequest {
            role: self.config.role,
            device_id: self.config.device_id.clone(),
            format: self.config.format,
            loopback: self.config.loopback,
        };

        let opened = match writer.sink() {
            Some(sink) => backend.open_stream(&request, sink),
            None => Err(CaptureError::Stream("Writer closed before start".to_string())),
        };

        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
                self.writer = Some(writer);
                tracing::info!(
                    "{} channel recording to {:?} ({}Hz, {}ch)",
                    self.config.role,
                    self.config.path,
                    self.config.format.sample_rate,
                    self.config.format.channels
                );
                Ok(())
            }
            Err(e) => {
                if let Err(finish_err) = writer.finish() {
                    tracing::debug!("Discarding writer for {:?}: {}", self.config.path, finish_err);
                }
                if let Err(remove_err) = std::fs::remove_file(&self.config.path) {
                    tracing::debug!("Could not remove {:?}: {}", self.config.path, remove_err);
                }
                Err(e)
            }
        }
    }

    /// Stop the stream, then flush and close the file
    ///
    /// Safe to call repeatedly; resources already released are skipped.
    pub fn stop(&mut self) -> CaptureResult<()> {
        let stream_result = match self.stream.take() {
            Some(mut stream) => stream.stop(),
            None => Ok(()),
        };

        let writer_result = match self.writer.take() {
            Some(writer) => writer.finish().map(|stats| {
                tracing::debug!(
                    "{} channel wrote {} samples to {:?}",
                    self.config.role,
                    stats.samples_written,
                    self.config.path
                );
            }),
            None => Ok(()),
        };

        stream_result.and(writer_result)
    }
}

impl Drop for CaptureChannel {
    fn drop(&mut self) {
        if self.stream.is_some() || self.writer.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!("{} channel cleanup failed: {}", self.config.role, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{FakeBackend, FAKE_SAMPLES_PER_STREAM};

    fn config(role: ChannelRole, dir: &Path) -> ChannelConfig {
        let device = AudioDeviceInfo {
            id: "fake".to_string(),
            name: "Fake".to_string(),
            is_input: role == ChannelRole::Mic,
            default_sample_rate: 16000,
            max_channels: 6,
        };
        ChannelConfig::for_device(role, dir.join(role.file_name()), &device, 2, 16)
    }

    #[test]
    fn test_channel_count_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(ChannelRole::System, dir.path());
        assert_eq!(config.format.channels, 2);
        assert!(config.loopback);
    }

    #[test]
    fn test_start_stop_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::healthy();
        let mut channel = CaptureChannel::new(config(ChannelRole::Mic, dir.path()));

        channel.start(&backend).unwrap();
        assert!(channel.is_running());
        channel.stop().unwrap();
        assert!(!channel.is_running());

        let reader = hound::WavReader::open(channel.path()).unwrap();
        assert_eq!(reader.len() as usize, FAKE_SAMPLES_PER_STREAM);
        assert_eq!(backend.open_stream_count(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::healthy();
        let mut channel = CaptureChannel::new(config(ChannelRole::Mic, dir.path()));

        channel.stop().unwrap();
        channel.start(&backend).unwrap();
        channel.stop().unwrap();
        channel.stop().unwrap();
    }

    #[test]
    fn test_loopback_unsupported_fails_without_creating_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            no_loopback: true,
            ..FakeBackend::default()
        };
        let mut channel = CaptureChannel::new(config(ChannelRole::System, dir.path()));

        let err = channel.start(&backend).unwrap_err();
        assert!(matches!(err, CaptureError::LoopbackUnsupported));
        assert_eq!(err.to_string(), "wasapi_loopback_unsupported");
        assert!(!channel.path().exists());
    }

    #[test]
    fn test_failed_stream_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::failing(ChannelRole::Mic);
        let mut channel = CaptureChannel::new(config(ChannelRole::Mic, dir.path()));

        assert!(channel.start(&backend).is_err());
        assert!(!channel.is_running());
        assert!(!channel.path().exists());
        channel.stop().unwrap();
    }

    #[test]
    fn test_stream_stop_failure_still_closes_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend {
            fail_stop: true,
            ..FakeBackend::default()
        };
        let mut channel = CaptureChannel::new(config(ChannelRole::Mic, dir.path()));

        channel.start(&backend).unwrap();
        assert!(channel.stop().is_err());

        let reader = hound::WavReader::open(channel.path()).unwrap();
        assert_eq!(reader.len() as usize, FAKE_SAMPLES_PER_STREAM);
    }
}
