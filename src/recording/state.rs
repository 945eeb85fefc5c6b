use thiserror::Error;

use crate::audio::CaptureError;

/// Why a recording attempt ended without a usable clip
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordingError {
    #[error("Microphone access denied. Please allow microphone access and try again.")]
    PermissionDenied,

    #[error("No microphone found. Please connect a microphone and try again.")]
    NoDevice,

    #[error("Failed to start recording: {0}")]
    Device(String),

    #[error("Recording error: {0}")]
    Recorder(String),

    /// Zero chunks captured, or a clip below the minimum size
    #[error("Recording too short ({bytes} bytes captured). Please try again.")]
    EmptyClip { chunks: usize, bytes: usize },

    #[error("Could not transcribe audio: {0}")]
    Transcription(String),

    /// Start requested while a session is already live; the state is unchanged
    #[error("Recording session is busy ({0})")]
    Busy(&'static str),
}

impl From<CaptureError> for RecordingError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied => RecordingError::PermissionDenied,
            CaptureError::NoDevice => RecordingError::NoDevice,
            CaptureError::Unavailable(reason) => RecordingError::Device(reason),
        }
    }
}

/// Lifecycle of the voice recording session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingState {
    /// No capture stream held
    Idle,
    /// Waiting for the platform to grant a capture stream
    Preparing,
    /// Recorder armed, chunks accumulating
    Recording,
    /// Clip handed off, transcription outstanding
    Transcribing,
    /// Last attempt failed; the next start clears it
    Error(RecordingError),
}

impl RecordingState {
    pub fn name(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Preparing => "preparing",
            RecordingState::Recording => "recording",
            RecordingState::Transcribing => "transcribing",
            RecordingState::Error(_) => "error",
        }
    }

    /// Idle and Error accept a new start request
    pub fn can_start(&self) -> bool {
        matches!(self, RecordingState::Idle | RecordingState::Error(_))
    }

    pub fn is_busy(&self) -> bool {
        !self.can_start()
    }

    pub fn error(&self) -> Option<&RecordingError> {
        match self {
            RecordingState::Error(err) => Some(err),
            _ => None,
        }
    }
}
