pub mod audio;
pub mod client;
pub mod config;
pub mod conversation;
pub mod markup;
pub mod recording;

pub use audio::{
    AudioFile, AudioFrame, CaptureConstraints, CaptureDevice, CaptureDeviceFactory, CaptureError,
    CaptureSource, CaptureStream, ChunkConfig, ChunkedRecorder, RecorderEvent, WavFileDevice,
};
pub use client::{AssistantService, ChatReply, HttpAssistantClient, ServiceError, Suggestion};
pub use config::Config;
pub use conversation::{
    ArtifactSink, ConversationController, DirectorySink, Message, Role, SendOutcome, VoiceOutcome,
};
pub use markup::{MarkupNode, TerminalRenderer, Token, TokenKind};
pub use recording::{AudioClip, RecordingConfig, RecordingError, RecordingSession, RecordingState};
