use serde::{Deserialize, Serialize};

/// Result of `POST /api/voice/transcribe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub success: bool,
}

/// Body of `POST /api/chat/message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Assistant reply to a chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub text: String,
    /// Code the assistant ran to produce the answer
    #[serde(default)]
    pub code: Option<String>,
    /// Captured execution output
    #[serde(default)]
    pub output: Option<String>,
    /// Embeddable image reference (data URI)
    #[serde(default)]
    pub visualization: Option<String>,
    #[serde(default)]
    pub error: Option<bool>,
}

impl ChatReply {
    pub fn is_error(&self) -> bool {
        self.error.unwrap_or(false)
    }
}

/// A visualization the assistant proposes for the current dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Result of `GET /api/chat/suggestions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Error body returned with non-success statuses
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorEnvelope {
    /// Human-readable reason, if the envelope carries one
    pub(crate) fn message(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(detail)) => return Some(detail.clone()),
            // Validation errors: [{"loc": [...], "msg": "..."}]
            Some(serde_json::Value::Array(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| {
                        let msg = item.get("msg")?.as_str()?;
                        let loc = item
                            .get("loc")
                            .and_then(|loc| loc.as_array())
                            .map(|loc| {
                                loc.iter()
                                    .map(|p| match p {
                                        serde_json::Value::String(s) => s.clone(),
                                        other => other.to_string(),
                                    })
                                    .collect::<Vec<_>>()
                                    .join(".")
                            })
                            .unwrap_or_default();
                        Some(format!("{}: {}", loc, msg))
                    })
                    .collect();
                if !parts.is_empty() {
                    return Some(parts.join("; "));
                }
            }
            _ => {}
        }
        self.error.clone()
    }
}
