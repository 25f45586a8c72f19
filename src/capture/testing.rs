//! Scripted audio backend for tests

use super::error::{CaptureError, CaptureResult};
use super::traits::{ActiveStream, AudioBackend, AudioDeviceInfo, ChannelRole, StreamRequest};
use super::wav::FrameSink;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Samples pushed by every fake stream as soon as it opens
pub(crate) const FAKE_SAMPLES_PER_STREAM: usize = 480;

/// Backend whose devices and streams fail on demand
#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    pub no_devices: bool,
    pub fail_mic: bool,
    pub fail_system: bool,
    pub no_loopback: bool,
    pub fail_stop: bool,
    /// How long each stream takes to stop
    pub stop_delay: Option<Duration>,
    pub open_streams: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn without_devices() -> Self {
        Self {
            no_devices: true,
            ..Self::default()
        }
    }

    pub fn failing(role: ChannelRole) -> Self {
        Self {
            fail_mic: role == ChannelRole::Mic,
            fail_system: role == ChannelRole::System,
            ..Self::default()
        }
    }

    pub fn slow_to_stop(delay: Duration) -> Self {
        Self {
            stop_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn open_stream_count(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn device(&self, is_input: bool) -> CaptureResult<AudioDeviceInfo> {
        if self.no_devices {
            return Err(CaptureError::DeviceNotFound(
                "No default input device".to_string(),
            ));
        }
        Ok(AudioDeviceInfo {
            id: if is_input { "fake-mic" } else { "fake-speakers" }.to_string(),
            name: "Fake device".to_string(),
            is_input,
            default_sample_rate: 16000,
            max_channels: if is_input { 1 } else { 8 },
        })
    }
}

impl AudioBackend for FakeBackend {
    fn default_input_device(&self) -> CaptureResult<AudioDeviceInfo> {
        self.device(true)
    }

    fn default_output_device(&self) -> CaptureResult<AudioDeviceInfo> {
        self.device(false)
    }

    fn supports_loopback(&self) -> bool {
        !self.no_loopback
    }

    fn open_stream(
        &self,
        request: &StreamRequest,
        sink: FrameSink,
    ) -> CaptureResult<Box<dyn ActiveStream>> {
        let fail = match request.role {
            ChannelRole::Mic => self.fail_mic,
            ChannelRole::System => self.fail_system,
        };
        if fail {
            return Err(CaptureError::Stream(format!(
                "{} device busy",
                request.role
            )));
        }

        sink.push(vec![0.25; FAKE_SAMPLES_PER_STREAM]);
        self.open_streams.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeStream {
            sink: Some(sink),
            fail_stop: self.fail_stop,
            stop_delay: self.stop_delay,
            open_streams: Arc::clone(&self.open_streams),
        }))
    }
}

struct FakeStream {
    sink: Option<FrameSink>,
    fail_stop: bool,
    stop_delay: Option<Duration>,
    open_streams: Arc<AtomicUsize>,
}

impl ActiveStream for FakeStream {
    fn stop(&mut self) -> CaptureResult<()> {
        if let Some(delay) = self.stop_delay {
            thread::sleep(delay);
        }
        if self.sink.take().is_some() {
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
        if self.fail_stop {
            return Err(CaptureError::Stream("driver refused to stop".to_string()));
        }
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        if self.sink.take().is_some() {
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
