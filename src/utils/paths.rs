//! Recording file paths exposed over HTTP
//!
//! Recorded files are served at `/recordings/<call_id>/<file>`. Anything that
//! maps between that public form and the filesystem goes through here so the
//! recordings root can never be escaped.

use super::error::{AppError, AppResult};
use crate::capture::ChannelRole;
use std::path::{Path, PathBuf};

/// URL prefix recorded files are served under
pub const PUBLIC_PREFIX: &str = "/recordings/";

/// Map a recorded file to its public path
///
/// Returns `None` unless the file exists inside `<root>/<call_id>/` and is
/// named `mic.wav` or `system.wav`.
pub fn public_audio_path(root: &Path, call_id: i64, path: Option<&Path>) -> Option<String> {
    let path = path?;
    let name = path.file_name()?.to_str()?;
    if !ChannelRole::is_recording_file(name) {
        return None;
    }

    let expected_dir = root.join(call_id.to_string()).canonicalize().ok()?;
    let resolved = path.canonicalize().ok()?;
    if !resolved.starts_with(&expected_dir) {
        return None;
    }

    Some(format!("{}{}/{}", PUBLIC_PREFIX, call_id, name))
}

/// Resolve a request for a recorded file to a path on disk
///
/// Accepts `"<call_id>/<file>"`, optionally prefixed with `/recordings/`.
pub fn resolve_recording_file(root: &Path, requested: &str) -> AppResult<PathBuf> {
    let normalized = requested.replace('\\', "/");
    let relative = normalized
        .strip_prefix(PUBLIC_PREFIX)
        .unwrap_or(&normalized)
        .trim_matches('/');

    let segments: Vec<&str> = relative.split('/').collect();
    let [call_id, name] = segments.as_slice() else {
        return Err(AppError::InvalidPath(requested.to_string()));
    };
    if call_id.parse::<i64>().is_err() || !ChannelRole::is_recording_file(name) {
        return Err(AppError::InvalidPath(requested.to_string()));
    }

    let base = root.canonicalize()?;
    let resolved = root
        .join(relative)
        .canonicalize()
        .map_err(|_| AppError::NotFound(requested.to_string()))?;

    if !resolved.starts_with(&base) || !resolved.is_file() {
        return Err(AppError::InvalidPath(requested.to_string()));
    }

    Ok(resolved)
}
