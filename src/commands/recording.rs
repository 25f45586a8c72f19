//! Recording commands
//!
//! Request handlers for the HTTP layer: start, stop and status of a call's
//! recording, mapped to the JSON bodies the browser extension consumes.

use crate::recorder::{RecordingReason, RecordingResult, RecordingSession};
use crate::store::{CallStore, ResearchRecording};
use crate::utils::error::AppResult;
use crate::utils::paths::public_audio_path;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Public paths of a call's recorded files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioPaths {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_path: Option<String>,
}

impl AudioPaths {
    fn resolve(root: &Path, call_id: i64, mic: Option<&Path>, sys: Option<&Path>) -> Self {
        Self {
            mic_path: public_audio_path(root, call_id, mic),
            sys_path: public_audio_path(root, call_id, sys),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mic_path.is_none() && self.sys_path.is_none()
    }

    /// Path stored on the call record; system audio wins over the mic
    pub fn preferred(&self) -> Option<&str> {
        self.sys_path.as_deref().or(self.mic_path.as_deref())
    }

    fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

/// Events published to real-time listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordingEvent {
    RecordingStarted {
        call_id: i64,
        recording_active: bool,
        audio_paths: AudioPaths,
    },
    RecordingStopped {
        call_id: i64,
        recording_active: bool,
        audio_paths: AudioPaths,
    },
}

/// JSON body returned by every recording endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingResponse {
    pub ok: bool,
    pub call_id: String,
    pub recording_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_paths: Option<AudioPaths>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RecordingReason>,
}

impl RecordingResponse {
    fn failure(call_id: i64, recording_active: bool, reason: Option<RecordingReason>) -> Self {
        Self {
            ok: false,
            call_id: call_id.to_string(),
            recording_active,
            audio_paths: None,
            reason,
        }
    }
}

/// Application state for recording
pub struct RecorderState {
    pub session: Arc<RecordingSession>,
    pub store: Arc<dyn CallStore>,
    recordings_dir: PathBuf,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecorderState {
    pub fn new(session: Arc<RecordingSession>, store: Arc<dyn CallStore>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            recordings_dir: session.recordings_dir().to_path_buf(),
            session,
            store,
            event_tx,
        }
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RecordingEvent) {
        // No subscribers is not an error.
        let _ = self.event_tx.send(event);
    }

    fn audio_paths(&self, call_id: i64, mic: Option<&Path>, sys: Option<&Path>) -> AudioPaths {
        AudioPaths::resolve(&self.recordings_dir, call_id, mic, sys)
    }
}

/// Start recording a logged call
pub async fn start_recording(state: &RecorderState, call_id: i64) -> AppResult<RecordingResponse> {
    let Some(call) = state.store.get_call(call_id).await? else {
        tracing::warn!("Recording start requested for unknown call {}", call_id);
        return Ok(RecordingResponse::failure(
            call_id,
            state.session.is_active_for_call(call_id),
            Some(RecordingReason::CallNotFound),
        ));
    };

    let session = Arc::clone(&state.session);
    let result: RecordingResult =
        tokio::task::spawn_blocking(move || session.start(call_id, &call.phone_digits)).await?;

    let recording_active = state.session.is_active_for_call(call_id);
    if !result.ok {
        return Ok(RecordingResponse::failure(call_id, recording_active, result.reason));
    }

    let audio_paths = state.audio_paths(
        call_id,
        result.mic_path.as_deref(),
        result.sys_path.as_deref(),
    );
    state.emit(RecordingEvent::RecordingStarted {
        call_id,
        recording_active,
        audio_paths: audio_paths.clone(),
    });

    Ok(RecordingResponse {
        ok: true,
        call_id: call_id.to_string(),
        recording_active,
        audio_paths: audio_paths.non_empty(),
        reason: None,
    })
}

/// Stop recording and attach the audio to the call record
pub async fn stop_recording(state: &RecorderState, call_id: i64) -> AppResult<RecordingResponse> {
    let session = Arc::clone(&state.session);
    let result = tokio::task::spawn_blocking(move || session.stop(call_id)).await?;

    if !result.ok {
        return Ok(RecordingResponse::failure(
            call_id,
            state.session.is_active_for_call(call_id),
            result.reason,
        ));
    }

    let audio_paths = state.audio_paths(
        call_id,
        result.mic_path.as_deref(),
        result.sys_path.as_deref(),
    );

    if let Some(selected) = audio_paths.preferred() {
        state.store.update_call_audio(call_id, selected).await?;
    }
    state.store.update_call_end(call_id).await?;

    if let (Some(call), Some(selected)) = (state.store.get_call(call_id).await?, audio_paths.preferred()) {
        state
            .store
            .add_research_recording(ResearchRecording {
                call_id,
                phone_digits: call.phone_digits,
                audio_path: selected.to_string(),
                duration_sec: result.duration_sec.unwrap_or(0),
                created_at: Utc::now(),
            })
            .await?;
    }

    let recording_active = state.session.is_active_for_call(call_id);
    state.emit(RecordingEvent::RecordingStopped {
        call_id,
        recording_active,
        audio_paths: audio_paths.clone(),
    });

    Ok(RecordingResponse {
        ok: true,
        call_id: call_id.to_string(),
        recording_active,
        audio_paths: audio_paths.non_empty(),
        reason: None,
    })
}

/// Report the recording state relative to a call
pub fn recording_status(state: &RecorderState, call_id: i64) -> RecordingResponse {
    let status = state.session.status(Some(call_id));
    let audio_paths = state.audio_paths(
        call_id,
        status.mic_path.as_deref(),
        status.sys_path.as_deref(),
    );

    RecordingResponse {
        ok: true,
        call_id: call_id.to_string(),
        recording_active: status.recording_active,
        audio_paths: audio_paths.non_empty(),
        reason: status.reason,
    }
}

/// Whether recording controls should show as active for a call
pub fn recording_active_for_call(state: &RecorderState, call_id: Option<i64>) -> bool {
    match call_id {
        Some(id) if id > 0 => state.session.is_active_for_call(id),
        _ => false,
    }
}
