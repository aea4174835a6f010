//! Listing and deleting memories

use serde::Deserialize;
use serde_json::Value;

use super::{MemoryId, require_text, scoped_get};
use crate::gateway::RequestDescriptor;
use crate::{Error, Result};

/// A stored memory as listed by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryRecord {
    /// Identifier
    pub memory_id: MemoryId,
    /// Memory text
    #[serde(default)]
    pub memory_content: String,
    /// Extracted elements, free-form
    #[serde(default)]
    pub extracted_elements: Option<Value>,
    /// Tags, free-form
    #[serde(default)]
    pub memory_tags: Option<Value>,
    /// Priority, free-form
    #[serde(default)]
    pub memory_priority: Option<Value>,
    /// Last access time
    #[serde(default)]
    pub last_accessed_at: Option<String>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<String>,
}

/// List response payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryList {
    /// Memories, newest first as the backend orders them
    #[serde(default)]
    pub memories: Vec<MemoryRecord>,
}

/// GET `/api/memory/list`
pub fn list_memories(user_id: &str, app_name: &str) -> Result<RequestDescriptor> {
    scoped_get("/api/memory/list", user_id, app_name)
}

/// DELETE `/api/memory/{id}`
pub fn delete_memory(memory_id: &str) -> Result<RequestDescriptor> {
    let id = require_text("memory_id", memory_id)?;
    // Integer ids and UUIDs only; anything else would need path escaping
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(Error::validation(format!("invalid memory id: {id}")));
    }
    RequestDescriptor::delete(format!("/api/memory/{id}"))
}
