//! Recording session
//!
//! Tracks the single call being recorded and coordinates its mic and
//! system-audio channels. Every operation takes the same lock; stopping
//! releases it before the hardware teardown so a new call can start while
//! the previous streams are still closing. The call being torn down cannot
//! be restarted until its files are finalized.

use super::channel::{CaptureChannel, ChannelConfig};
use super::state::{RecordingReason, RecordingResult, RecordingState, RecordingStatus};
use crate::capture::{AudioBackend, CaptureError, CaptureResult, ChannelRole};
use crate::config::RecorderConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// A recording in progress
struct ActiveRecording {
    call_id: i64,
    phone_digits: String,
    started_at: DateTime<Utc>,
    started: Instant,
    mic: Option<CaptureChannel>,
    system: Option<CaptureChannel>,
}

impl ActiveRecording {
    fn mic_path(&self) -> Option<PathBuf> {
        self.mic.as_ref().map(|c| c.path().to_path_buf())
    }

    fn sys_path(&self) -> Option<PathBuf> {
        self.system.as_ref().map(|c| c.path().to_path_buf())
    }
}

#[derive(Default)]
struct SessionInner {
    /// `Some` exactly while a call is being recorded
    active: Option<ActiveRecording>,

    /// Calls whose channels are still closing after `stop`
    closing: HashSet<i64>,
}

/// Records at most one call at a time
pub struct RecordingSession {
    backend: Arc<dyn AudioBackend>,
    recordings_dir: PathBuf,
    queue_capacity: usize,
    max_channels: u16,
    require_both_channels: bool,

    inner: Mutex<SessionInner>,
}

impl RecordingSession {
    pub fn new(backend: Arc<dyn AudioBackend>, config: &RecorderConfig) -> Self {
        Self {
            backend,
            recordings_dir: config.recordings_dir.clone(),
            queue_capacity: config.writer_queue_capacity,
            max_channels: config.max_channels,
            require_both_channels: config.require_both_channels,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Directory holding the files for `call_id`
    pub fn call_dir(&self, call_id: i64) -> PathBuf {
        self.recordings_dir.join(call_id.to_string())
    }

    pub fn state(&self) -> RecordingState {
        if self.inner.lock().active.is_some() {
            RecordingState::Active
        } else {
            RecordingState::Idle
        }
    }

    /// Start recording `call_id`
    ///
    /// Succeeds when at least one of the two channels starts, unless
    /// `require_both_channels` is set.
    pub fn start(&self, call_id: i64, phone_digits: &str) -> RecordingResult {
        let mut inner = self.inner.lock();

        if let Some(current) = inner.active.as_ref() {
            tracing::warn!(
                "Recording start for call {} rejected: call {} is already recording",
                call_id,
                current.call_id
            );
            return RecordingResult::failure(call_id, RecordingReason::AlreadyActive);
        }
        if inner.closing.contains(&call_id) {
            tracing::warn!(
                "Recording start for call {} rejected: previous recording is still closing",
                call_id
            );
            return RecordingResult::failure(call_id, RecordingReason::AlreadyActive);
        }

        tracing::info!("Starting recording for call {}", call_id);

        let (mic_config, sys_config) = match self.prepare_channels(call_id) {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!("Recording start failed for call {}: {}", call_id, e);
                return RecordingResult::failure(call_id, RecordingReason::Device(e.to_string()));
            }
        };

        let (mic, mic_error) = self.start_channel(mic_config);
        let (system, sys_error) = self.start_channel(sys_config);

        let failure = match (&mic_error, &sys_error) {
            (Some(_), Some(_)) => Some(RecordingReason::RecordingStartFailed),
            (Some(e), None) | (None, Some(e)) if self.require_both_channels => {
                Some(RecordingReason::from(e))
            }
            _ => None,
        };

        if let Some(reason) = failure {
            for mut channel in [mic, system].into_iter().flatten() {
                if let Err(e) = channel.stop() {
                    tracing::warn!("Cleanup of {} channel failed: {}", channel.role(), e);
                }
            }
            tracing::error!("Recording start failed for call {}: {}", call_id, reason);
            return RecordingResult::failure(call_id, reason);
        }

        let recording = ActiveRecording {
            call_id,
            phone_digits: phone_digits.to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            mic,
            system,
        };
        let result = RecordingResult::started(call_id, recording.mic_path(), recording.sys_path());
        inner.active = Some(recording);

        tracing::info!(
            "Recording started for call {} (mic: {}, system: {})",
            call_id,
            result.mic_path.is_some(),
            result.sys_path.is_some()
        );
        result
    }

    /// Stop recording `call_id`
    pub fn stop(&self, call_id: i64) -> RecordingResult {
        let mut recording = {
            let mut inner = self.inner.lock();
            match inner.active.take() {
                None => return RecordingResult::failure(call_id, RecordingReason::NotActive),
                Some(current) if current.call_id != call_id => {
                    tracing::warn!(
                        "Recording stop for call {} rejected: call {} is recording",
                        call_id,
                        current.call_id
                    );
                    inner.active = Some(current);
                    return RecordingResult::failure(call_id, RecordingReason::CallIdMismatch);
                }
                Some(current) => {
                    inner.closing.insert(call_id);
                    current
                }
            }
        };

        tracing::info!("Stopping recording for call {}", call_id);

        let mut failed = Vec::new();
        for channel in [recording.mic.as_mut(), recording.system.as_mut()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = channel.stop() {
                tracing::error!("{} recording stop failed: {}", channel.role(), e);
                failed.push(channel.role());
            }
        }
        self.inner.lock().closing.remove(&call_id);

        if !failed.is_empty() {
            return RecordingResult::failure(call_id, RecordingReason::StopFailed);
        }

        let duration_sec = recording.started.elapsed().as_secs_f64().round() as u64;
        tracing::info!(
            "Recording stopped for call {} after {}s",
            call_id,
            duration_sec
        );

        RecordingResult::stopped(
            recording.call_id,
            recording.mic_path(),
            recording.sys_path(),
            duration_sec,
        )
    }

    /// Report what is being recorded, relative to `call_id` when given
    pub fn status(&self, call_id: Option<i64>) -> RecordingStatus {
        let inner = self.inner.lock();
        let Some(current) = inner.active.as_ref() else {
            return RecordingStatus::idle();
        };

        match call_id {
            Some(id) if id != current.call_id => RecordingStatus::other_call(current.call_id),
            _ => RecordingStatus {
                recording_active: true,
                call_id: Some(current.call_id),
                reason: None,
                phone_digits: Some(current.phone_digits.clone()),
                started_at: Some(current.started_at),
                mic_path: current.mic_path(),
                sys_path: current.sys_path(),
            },
        }
    }

    pub fn is_active_for_call(&self, call_id: i64) -> bool {
        self.status(Some(call_id)).recording_active
    }

    /// Resolve devices and lay out the call directory
    fn prepare_channels(&self, call_id: i64) -> CaptureResult<(ChannelConfig, ChannelConfig)> {
        let input = self.backend.default_input_device()?;
        let output = self.backend.default_output_device()?;

        let call_dir = self.call_dir(call_id);
        fs::create_dir_all(&call_dir)?;

        let mic_path = call_dir.join(ChannelRole::Mic.file_name());
        let sys_path = call_dir.join(ChannelRole::System.file_name());
        remove_stale_file(&mic_path);
        remove_stale_file(&sys_path);

        Ok((
            ChannelConfig::for_device(
                ChannelRole::Mic,
                mic_path,
                &input,
                self.max_channels,
                self.queue_capacity,
            ),
            ChannelConfig::for_device(
                ChannelRole::System,
                sys_path,
                &output,
                self.max_channels,
                self.queue_capacity,
            ),
        ))
    }

    fn start_channel(&self, config: ChannelConfig) -> (Option<CaptureChannel>, Option<CaptureError>) {
        let mut channel = CaptureChannel::new(config);
        match channel.start(self.backend.as_ref()) {
            Ok(()) => (Some(channel), None),
            Err(CaptureError::LoopbackUnsupported) => {
                tracing::warn!("System audio capture unavailable (WASAPI loopback unsupported)");
                (None, Some(CaptureError::LoopbackUnsupported))
            }
            Err(e) => {
                tracing::error!("{} recording start failed: {}", channel.role(), e);
                (None, Some(e))
            }
        }
    }
}

fn remove_stale_file(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed previous recording {:?}", path),
        Err(e) => tracing::warn!("Unable to remove existing recording file {:?}: {}", path, e),
    }
}
