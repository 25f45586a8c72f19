//! Recorder configuration
//!
//! Loaded from an optional JSON file, then overridden from the environment.

use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory name under the platform data dir
pub const APP_NAME: &str = "NDM";

/// Overrides [`RecorderConfig::recordings_dir`]
pub const RECORDINGS_DIR_ENV: &str = "NDM_RECORDINGS_DIR";

/// Path to a JSON config file read by the binary
pub const CONFIG_PATH_ENV: &str = "NDM_RECORDER_CONFIG";

/// Settings for the recording session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Root directory; each call records into `<recordings_dir>/<call_id>/`
    pub recordings_dir: PathBuf,

    /// Audio buffers queued between a stream callback and its file writer
    pub writer_queue_capacity: usize,

    /// Upper bound on channels captured per stream
    pub max_channels: u16,

    /// Fail the start unless both mic and system audio come up
    pub require_both_channels: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            recordings_dir: default_recordings_dir(),
            writer_queue_capacity: 64,
            max_channels: 2,
            require_both_channels: false,
        }
    }
}

impl RecorderConfig {
    /// Read `path` if it exists, fall back to defaults, then apply the environment
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        Self::load_with(path, std::env::var(RECORDINGS_DIR_ENV).ok())
    }

    /// [`load`](Self::load) with the recordings dir override passed in
    pub fn load_with(path: Option<&Path>, recordings_dir: Option<String>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(path)?;
                let config: Self = serde_json::from_str(&content)?;
                tracing::debug!("Loaded recorder config from {:?}", path);
                config
            }
            Some(path) => {
                tracing::warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(recordings_dir);
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides taken from the environment
    pub fn apply_overrides(&mut self, recordings_dir: Option<String>) {
        if let Some(dir) = recordings_dir.filter(|dir| !dir.trim().is_empty()) {
            self.recordings_dir = PathBuf::from(dir.trim());
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.writer_queue_capacity == 0 {
            return Err(AppError::Config(
                "writerQueueCapacity must be at least 1".to_string(),
            ));
        }
        if self.max_channels == 0 {
            return Err(AppError::Config("maxChannels must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// `<platform data dir>/NDM/recordings`
pub fn default_recordings_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("recordings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::default();
        assert_eq!(config.writer_queue_capacity, 64);
        assert_eq!(config.max_channels, 2);
        assert!(!config.require_both_channels);
        assert!(config.recordings_dir.ends_with("NDM/recordings"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.json");
        fs::write(&path, r#"{ "recordingsDir": "/tmp/calls", "requireBothChannels": true }"#)
            .unwrap();

        let config = RecorderConfig::load_with(Some(&path), None).unwrap();
        assert_eq!(config.recordings_dir, PathBuf::from("/tmp/calls"));
        assert!(config.require_both_channels);
        assert_eq!(config.writer_queue_capacity, 64);

        let config = RecorderConfig::load(Some(&path)).unwrap();
        assert!(config.require_both_channels);
        assert_eq!(config.max_channels, 2);
    }

    #[test]
    fn test_load_applies_override_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.json");
        fs::write(&path, r#"{ "recordingsDir": "/tmp/calls" }"#).unwrap();

        let config =
            RecorderConfig::load_with(Some(&path), Some("/srv/recordings".to_string())).unwrap();
        assert_eq!(config.recordings_dir, PathBuf::from("/srv/recordings"));

        fs::write(&path, r#"{ "maxChannels": 0 }"#).unwrap();
        assert!(matches!(
            RecorderConfig::load_with(Some(&path), None),
            Err(AppError::Config(_))
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            RecorderConfig::load_with(Some(&path), None),
            Err(AppError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            RecorderConfig::load_with(Some(&dir.path().join("absent.json")), None).unwrap();
        assert_eq!(config.writer_queue_capacity, 64);
        assert!(!config.require_both_channels);
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = RecorderConfig::default();
        let original = config.recordings_dir.clone();

        config.apply_overrides(Some("   ".to_string()));
        assert_eq!(config.recordings_dir, original);

        config.apply_overrides(Some("/data/recordings".to_string()));
        assert_eq!(config.recordings_dir, PathBuf::from("/data/recordings"));
    }

    #[test]
    fn test_invalid_queue_capacity_is_rejected() {
        let config = RecorderConfig {
            writer_queue_capacity: 0,
            ..RecorderConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
