//! Command handlers
//!
//! Entry points the HTTP layer calls into. Handlers never fail on ordinary
//! recording outcomes; those come back as `ok: false` with a reason code.

pub mod recording;

pub use recording::{
    recording_active_for_call, recording_status, start_recording, stop_recording, AudioPaths,
    RecorderState, RecordingEvent, RecordingResponse,
};
