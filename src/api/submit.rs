//! Transcript submission

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MemoryId, require_text};
use crate::gateway::RequestDescriptor;
use crate::{Error, Result};

/// Most messages accepted in one submission
pub const MAX_MESSAGES: usize = 20;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user
    User,
    /// Assistant
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(Error::validation(format!(
                "role must be 'user' or 'assistant', got '{other}'"
            ))),
        }
    }
}

/// One message of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker
    pub role: Role,
    /// Text
    pub content: String,
    /// When the message was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Message without a timestamp
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }
}

impl FromStr for ChatMessage {
    type Err = Error;

    /// Parse `role:content`, e.g. `user:I prefer green tea`
    fn from_str(s: &str) -> Result<Self> {
        let (role, content) = s
            .split_once(':')
            .ok_or_else(|| Error::validation(format!("expected ROLE:CONTENT, got '{s}'")))?;
        Ok(Self::new(role.parse()?, content))
    }
}

/// A chat transcript to turn into memories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Owner of the conversation
    pub user_id: String,
    /// Application the conversation belongs to
    pub app_name: String,
    /// Messages in order
    pub messages: Vec<ChatMessage>,
}

/// What the backend returns for an accepted submission
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitReceipt {
    /// Identifier of the memory being generated
    pub memory_id: MemoryId,
}

/// POST `/api/memory/submit`
pub fn submit_transcript(transcript: &Transcript) -> Result<RequestDescriptor> {
    let user_id = require_text("user_id", &transcript.user_id)?;
    let app_name = require_text("app_name", &transcript.app_name)?;

    if transcript.messages.is_empty() {
        return Err(Error::validation("at least one message is required"));
    }
    if transcript.messages.len() > MAX_MESSAGES {
        return Err(Error::validation(format!(
            "at most {MAX_MESSAGES} messages can be submitted at once, got {}",
            transcript.messages.len()
        )));
    }

    let messages = transcript
        .messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let content = message.content.trim();
            if content.is_empty() {
                return Err(Error::validation(format!(
                    "message {} has empty content",
                    index + 1
                )));
            }
            Ok(ChatMessage {
                content: content.to_string(),
                ..message.clone()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    RequestDescriptor::post("/api/memory/submit")?.with_json(&Transcript {
        user_id,
        app_name,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Verb;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn transcript(messages: Vec<ChatMessage>) -> Transcript {
        Transcript {
            user_id: "u1".into(),
            app_name: "a1".into(),
            messages,
        }
    }

    #[test]
    fn builds_trimmed_post_body() {
        let descriptor = submit_transcript(&Transcript {
            user_id: " u1 ".into(),
            app_name: "a1".into(),
            messages: vec![ChatMessage::new(Role::User, "  hi  ")],
        })
        .unwrap();

        assert_eq!(descriptor.method(), Verb::Post);
        assert_eq!(descriptor.path(), "/api/memory/submit");
        assert_eq!(
            serde_json::Value::Object(descriptor.payload().clone()),
            json!({
                "user_id": "u1",
                "app_name": "a1",
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }

    #[test]
    fn rejects_empty_or_oversized_transcripts() {
        assert!(submit_transcript(&transcript(vec![])).is_err());

        let many = vec![ChatMessage::new(Role::User, "x"); MAX_MESSAGES + 1];
        let err = submit_transcript(&transcript(many)).unwrap_err();
        assert!(err.to_string().contains("at most 20"));

        let exactly = vec![ChatMessage::new(Role::Assistant, "x"); MAX_MESSAGES];
        assert!(submit_transcript(&transcript(exactly)).is_ok());
    }

    #[test]
    fn rejects_blank_message_content() {
        let err = submit_transcript(&transcript(vec![
            ChatMessage::new(Role::User, "hello"),
            ChatMessage::new(Role::Assistant, "   "),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: message 2 has empty content");
    }

    #[test]
    fn parses_role_prefixed_messages() {
        let message: ChatMessage = "assistant: noted, green tea".parse().unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, " noted, green tea");

        assert!("system:hi".parse::<ChatMessage>().is_err());
        assert!("no separator".parse::<ChatMessage>().is_err());
    }

    #[test]
    fn receipt_accepts_uuid_ids() {
        let receipt: SubmitReceipt =
            serde_json::from_value(json!({"memory_id": "8f14e45f-ea9e-4b0f-bb57-1f1a7c2d9e1b"}))
                .unwrap();
        assert!(matches!(receipt.memory_id, MemoryId::Text(_)));
    }
}
