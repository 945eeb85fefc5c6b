use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use crate::client::ChatReply;
use crate::markup::{self, MarkupNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<String>,
    #[serde(default)]
    pub error: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            code: None,
            output: None,
            visualization: None,
            error: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(reply: ChatReply) -> Self {
        let error = reply.is_error();
        Self {
            code: reply.code,
            output: reply.output,
            visualization: reply.visualization,
            error,
            ..Self::new(Role::Assistant, reply.text)
        }
    }

    /// Assistant-side record of a failed turn
    pub fn failure(reason: impl Display) -> Self {
        Self {
            error: true,
            ..Self::new(Role::Assistant, format!("Error: {}", reason))
        }
    }

    /// Parse the content into display nodes
    pub fn markup(&self) -> Vec<MarkupNode> {
        markup::parse(&self.content)
    }

    /// Local wall-clock time, `HH:MM`
    pub fn time_label(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_copies_reply_fields() {
        let reply = ChatReply {
            text: "Mean is 4.2".to_string(),
            code: Some("df.mean()".to_string()),
            output: Some("4.2".to_string()),
            visualization: None,
            error: None,
        };
        let message = Message::assistant(reply);
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Mean is 4.2");
        assert_eq!(message.code.as_deref(), Some("df.mean()"));
        assert!(!message.error);
    }

    #[test]
    fn test_flagged_reply_is_error() {
        let reply = ChatReply {
            text: "Column not found".to_string(),
            error: Some(true),
            ..Default::default()
        };
        assert!(Message::assistant(reply).error);
    }

    #[test]
    fn test_failure_prefix() {
        let message = Message::failure("Request timed out after 60s");
        assert_eq!(message.content, "Error: Request timed out after 60s");
        assert!(message.error);
        assert_eq!(message.role, Role::Assistant);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("code").is_none());
    }
}
