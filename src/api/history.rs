//! Chat history lookup

use serde::{Deserialize, Serialize};

use super::require_text;
use crate::Result;
use crate::gateway::RequestDescriptor;

/// Chat history filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Owner of the conversation
    pub user_id: String,
    /// Application scope
    pub app_name: String,
    /// Restrict to one session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// One stored chat message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatRecord {
    /// Session the message belongs to
    #[serde(default)]
    pub session_id: Option<String>,
    /// Speaker, usually `user` or `assistant`
    pub role: String,
    /// Text
    pub content: String,
    /// Time the message was stored
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// History response payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatHistory {
    /// Messages in backend order
    #[serde(default)]
    pub chat_history: Vec<ChatRecord>,
}

/// Messages of one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGroup {
    /// Session id, `None` for messages stored without one
    pub session_id: Option<String>,
    /// Messages in backend order
    pub records: Vec<ChatRecord>,
}

impl SessionGroup {
    /// Timestamp of the first message
    #[must_use]
    pub fn started_at(&self) -> Option<&str> {
        self.records.first().and_then(|r| r.timestamp.as_deref())
    }
}

/// GET `/api/memory/chat/history`
pub fn chat_history(query: &HistoryQuery) -> Result<RequestDescriptor> {
    let user_id = require_text("user_id", &query.user_id)?;
    let app_name = require_text("app_name", &query.app_name)?;
    let session_id = query
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    RequestDescriptor::get("/api/memory/chat/history")?.with_json(&HistoryQuery {
        user_id,
        app_name,
        session_id,
    })
}

/// Group records by session, keeping the order sessions first appear in
#[must_use]
pub fn group_by_session(records: Vec<ChatRecord>) -> Vec<SessionGroup> {
    let mut groups: Vec<SessionGroup> = Vec::new();
    for record in records {
        match groups
            .iter_mut()
            .find(|group| group.session_id == record.session_id)
        {
            Some(group) => group.records.push(record),
            None => groups.push(SessionGroup {
                session_id: record.session_id.clone(),
                records: vec![record],
            }),
        }
    }
    groups
}
