//! Recording state management
//!
//! Defines the session state machine and the immutable result values the
//! session hands back to callers.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::capture::CaptureError;

/// Current state of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Recording a call
    Active,
}

/// Why an operation did not (fully) succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingReason {
    AlreadyActive,
    LoopbackUnsupported,
    RecordingStartFailed,
    NotActive,
    CallIdMismatch,
    StopFailed,
    CallNotFound,
    /// Raw device or driver error text
    Device(String),
}

impl RecordingReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AlreadyActive => "already_active",
            Self::LoopbackUnsupported => "wasapi_loopback_unsupported",
            Self::RecordingStartFailed => "recording_start_failed",
            Self::NotActive => "not_active",
            Self::CallIdMismatch => "call_id_mismatch",
            Self::StopFailed => "stop_failed",
            Self::CallNotFound => "call_not_found",
            Self::Device(message) => message,
        }
    }
}

impl fmt::Display for RecordingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RecordingReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&CaptureError> for RecordingReason {
    fn from(error: &CaptureError) -> Self {
        match error {
            CaptureError::LoopbackUnsupported => Self::LoopbackUnsupported,
            other => Self::Device(other.to_string()),
        }
    }
}

/// Outcome of a start or stop request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingResult {
    pub ok: bool,
    pub call_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RecordingReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u64>,
}

impl RecordingResult {
    pub fn failure(call_id: i64, reason: RecordingReason) -> Self {
        Self {
            ok: false,
            call_id,
            mic_path: None,
            sys_path: None,
            reason: Some(reason),
            duration_sec: None,
        }
    }

    pub fn started(call_id: i64, mic_path: Option<PathBuf>, sys_path: Option<PathBuf>) -> Self {
        Self {
            ok: true,
            call_id,
            mic_path,
            sys_path,
            reason: None,
            duration_sec: None,
        }
    }

    pub fn stopped(
        call_id: i64,
        mic_path: Option<PathBuf>,
        sys_path: Option<PathBuf>,
        duration_sec: u64,
    ) -> Self {
        Self {
            duration_sec: Some(duration_sec),
            ..Self::started(call_id, mic_path, sys_path)
        }
    }
}

/// Read-only snapshot returned by a status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingStatus {
    /// Whether a recording is running for the queried call
    pub recording_active: bool,

    /// The call actually being recorded, if any
    pub call_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RecordingReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_digits: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mic_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_path: Option<PathBuf>,
}

impl RecordingStatus {
    pub fn idle() -> Self {
        Self {
            recording_active: false,
            call_id: None,
            reason: Some(RecordingReason::NotActive),
            phone_digits: None,
            started_at: None,
            mic_path: None,
            sys_path: None,
        }
    }

    pub fn other_call(active_call_id: i64) -> Self {
        Self {
            call_id: Some(active_call_id),
            reason: Some(RecordingReason::CallIdMismatch),
            ..Self::idle()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(RecordingReason::AlreadyActive.as_str(), "already_active");
        assert_eq!(RecordingReason::StopFailed.to_string(), "stop_failed");
        assert_eq!(
            RecordingReason::from(&CaptureError::LoopbackUnsupported),
            RecordingReason::LoopbackUnsupported
        );
        assert_eq!(
            RecordingReason::from(&CaptureError::DeviceNotFound("none".to_string())).as_str(),
            "Device not found: none"
        );
    }

    #[test]
    fn test_result_serializes_reason_as_string() {
        let result = RecordingResult::failure(7, RecordingReason::CallIdMismatch);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["call_id"], 7);
        assert_eq!(json["reason"], "call_id_mismatch");
        assert!(json.get("mic_path").is_none());
    }

    #[test]
    fn test_other_call_status_discloses_active_call() {
        let status = RecordingStatus::other_call(3);
        assert!(!status.recording_active);
        assert_eq!(status.call_id, Some(3));
        assert_eq!(status.reason, Some(RecordingReason::CallIdMismatch));
    }
}
