use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info};

use super::types::{ChatReply, ChatRequest, ErrorEnvelope, SuggestionsResponse, TranscriptionResponse};
use super::{AssistantService, ServiceError};
use crate::recording::ClipUpload;

const TRANSCRIBE_PATH: &str = "/api/voice/transcribe";
const CHAT_MESSAGE_PATH: &str = "/api/chat/message";
const CHAT_SUGGESTIONS_PATH: &str = "/api/chat/suggestions";
const CHAT_CLEAR_PATH: &str = "/api/chat/clear";

/// REST client for the IntelliML backend
#[derive(Clone)]
pub struct HttpAssistantClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAssistantClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        info!("Assistant client targeting {}", base_url);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout.as_secs())
        } else {
            error!("Network error: {}", e);
            ServiceError::Network(e.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, ServiceError> {
        let response = self.check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    async fn check_status(&self, response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => envelope.message(),
            Err(_) if !body.trim().is_empty() => Some(body.chars().take(200).collect()),
            Err(_) => None,
        }
        .unwrap_or_else(|| format!("API Error: {}", status));

        error!("API error {}: {}", status.as_u16(), message);

        Err(ServiceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl AssistantService for HttpAssistantClient {
    async fn transcribe(&self, upload: ClipUpload) -> Result<TranscriptionResponse, ServiceError> {
        if upload.bytes.is_empty() {
            return Err(ServiceError::EmptyUpload);
        }

        let url = self.url(TRANSCRIBE_PATH);
        info!(
            "Uploading {} ({} bytes, {}) to {}",
            upload.file_name,
            upload.bytes.len(),
            upload.mime_type,
            url
        );

        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| ServiceError::InvalidResponse(format!("invalid media type: {}", e)))?;
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let transcription: TranscriptionResponse = self.decode(response).await?;
        debug!(
            "Transcription result: success={}, {} chars",
            transcription.success,
            transcription.text.len()
        );

        Ok(transcription)
    }

    async fn send_message(&self, text: &str) -> Result<ChatReply, ServiceError> {
        let url = self.url(CHAT_MESSAGE_PATH);
        debug!("POST {}", url);

        let request = ChatRequest {
            message: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.decode(response).await
    }

    async fn suggestions(&self) -> Result<SuggestionsResponse, ServiceError> {
        let url = self.url(CHAT_SUGGESTIONS_PATH);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.decode(response).await
    }

    async fn clear_history(&self) -> Result<(), ServiceError> {
        let url = self.url(CHAT_CLEAR_PATH);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.check_status(response).await?;
        Ok(())
    }
}
