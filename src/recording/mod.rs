//! Voice recording session management
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Capture stream acquisition and guaranteed release
//! - Chunk collection from the stream's recorder
//! - Clip finalization and the minimum-size check
//! - The transcription handoff state

mod clip;
mod config;
mod session;
mod state;

pub use clip::{extension_for_mime, AudioClip, ClipUpload};
pub use config::RecordingConfig;
pub use session::{RecordingSession, RecordingStats};
pub use state::{RecordingError, RecordingState};
