//! Feature modules for the memory backend
//!
//! Each function validates its input and returns a [`RequestDescriptor`]
//! ready for [`RequestGateway::send`](crate::gateway::RequestGateway::send).
//! Input that fails validation yields [`Error::Validation`] and no request is
//! ever built.

mod history;
mod manage;
mod query;
mod settings;
mod submit;

pub use history::{
    ChatHistory, ChatRecord, HistoryQuery, SessionGroup, chat_history, group_by_session,
};
pub use manage::{MemoryList, MemoryRecord, delete_memory, list_memories};
pub use query::{MemoryQuery, QueryHit, QueryResults, SimilarityMode, query_memories};
pub use settings::{
    AppConfig, AppConfigUpdate, ExpiryStrategy, MemoryConfigRecord, MemoryConfigUpdate,
    PriorityWeights, UserConfig, get_app_config, get_user_config, update_app_config,
    update_user_config,
};
pub use submit::{ChatMessage, MAX_MESSAGES, Role, SubmitReceipt, Transcript, submit_transcript};

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::gateway::RequestDescriptor;
use crate::{Error, Result};

/// Memory identifier. Stored memories use integers; submissions still being
/// processed in the background are identified by a UUID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryId {
    /// Numeric row id
    Number(i64),
    /// Opaque string id
    Text(String),
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Trimmed, non-empty text or a validation error naming the field
pub(crate) fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Check that a weight or threshold lies in [0, 1]
pub(crate) fn require_unit_interval(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{field} must be between 0 and 1, got {value}"
        )))
    }
}

/// Check that an integer lies in an inclusive range
pub(crate) fn require_range(field: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}

/// Descriptor for a user/app scoped read
pub(crate) fn scoped_get(path: &str, user_id: &str, app_name: &str) -> Result<RequestDescriptor> {
    let user_id = require_text("user_id", user_id)?;
    let app_name = require_text("app_name", app_name)?;
    RequestDescriptor::get(path)?.with_json(&serde_json::json!({
        "user_id": user_id,
        "app_name": app_name,
    }))
}

/// Render a backend timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// Accepts RFC 3339 and naive ISO 8601 (the backend emits both); anything
/// else is returned unchanged.
#[must_use]
pub fn format_timestamp(raw: &str) -> String {
    const DISPLAY: &str = "%Y-%m-%d %H:%M:%S";
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.format(DISPLAY).to_string();
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_or_else(|_| raw.to_string(), |ts| ts.format(DISPLAY).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_id_accepts_numbers_and_strings() {
        let numeric: MemoryId = serde_json::from_str("42").unwrap();
        assert_eq!(numeric, MemoryId::Number(42));
        assert_eq!(numeric.to_string(), "42");

        let text: MemoryId =
            serde_json::from_str(r#""1b4e28ba-2fa1-11d2-883f-0016d3cca427""#).unwrap();
        assert_eq!(text.to_string(), "1b4e28ba-2fa1-11d2-883f-0016d3cca427");
    }

    #[test]
    fn require_text_trims() {
        assert_eq!(require_text("user_id", "  u1 ").unwrap(), "u1");
        let err = require_text("app_name", "   ").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: app_name is required");
    }

    #[test]
    fn unit_interval_bounds_are_inclusive() {
        assert!(require_unit_interval("w", 0.0).is_ok());
        assert!(require_unit_interval("w", 1.0).is_ok());
        assert!(require_unit_interval("w", 1.01).is_err());
        assert!(require_unit_interval("w", f64::NAN).is_err());
    }

    #[test]
    fn formats_backend_timestamps() {
        assert_eq!(format_timestamp("2024-03-01T08:15:30"), "2024-03-01 08:15:30");
        assert_eq!(
            format_timestamp("2024-03-01T08:15:30.123456"),
            "2024-03-01 08:15:30"
        );
        assert_eq!(
            format_timestamp("2024-03-01T08:15:30+08:00"),
            "2024-03-01 08:15:30"
        );
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn scoped_get_requires_both_keys() {
        assert!(scoped_get("/api/memory/list", "", "a1").is_err());
        let descriptor = scoped_get("/api/memory/list", " u1 ", "a1").unwrap();
        assert_eq!(descriptor.payload()["user_id"], "u1");
    }
}
