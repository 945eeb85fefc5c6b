//! Remote assistant service
//!
//! `AssistantService` is the seam the conversation controller talks through;
//! `HttpAssistantClient` is the REST implementation against the backend.

mod http;
pub mod types;

use thiserror::Error;

use crate::recording::ClipUpload;

pub use http::HttpAssistantClient;
pub use types::{ChatReply, ChatRequest, Suggestion, SuggestionsResponse, TranscriptionResponse};

/// Why a remote call failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Network error or server unavailable: {0}")]
    Network(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("File is empty")]
    EmptyUpload,
}

/// Remote operations the conversation consumes
#[async_trait::async_trait]
pub trait AssistantService: Send + Sync {
    /// Transcribe a recorded clip
    async fn transcribe(&self, upload: ClipUpload) -> Result<TranscriptionResponse, ServiceError>;

    /// Send one user turn and get the assistant's reply
    async fn send_message(&self, text: &str) -> Result<ChatReply, ServiceError>;

    /// Visualization ideas for the loaded dataset
    async fn suggestions(&self) -> Result<SuggestionsResponse, ServiceError>;

    /// Drop the server-side conversation context
    async fn clear_history(&self) -> Result<(), ServiceError>;
}
