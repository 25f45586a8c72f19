//! Recording system module
//!
//! - CaptureChannel owns one stream and its WAV file
//! - RecordingSession records one call at a time through two channels
//! - state holds the result values handed back to callers

pub mod channel;
pub mod session;
pub mod state;

pub use channel::{CaptureChannel, ChannelConfig};
pub use session::RecordingSession;
pub use state::{RecordingReason, RecordingResult, RecordingState, RecordingStatus};
