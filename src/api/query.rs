//! Similarity search

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MemoryId, require_range, require_text};
use crate::gateway::RequestDescriptor;
use crate::{Error, Result};

/// How the backend fills the `similarity` field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMode {
    /// Already a similarity in [0, 1]
    #[default]
    Similarity,
    /// A vector-store distance; similarity is `1 - distance`
    Distance,
}

/// A similarity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Owner of the memories
    pub user_id: String,
    /// Application scope
    pub app_name: String,
    /// Free-text query
    pub query: String,
    /// Number of results, 1 to 20
    pub top_k: u32,
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryHit {
    /// Memory identifier
    pub memory_id: MemoryId,
    /// Stored memory text
    #[serde(default)]
    pub memory_content: Option<String>,
    /// Vector-store document text (some backends return this instead)
    #[serde(default)]
    pub document: Option<String>,
    /// Extracted elements, free-form
    #[serde(default)]
    pub extracted_elements: Option<Value>,
    /// Similarity or distance, depending on the backend
    pub similarity: f64,
    /// Creation time as sent by the backend
    #[serde(default)]
    pub created_at: Option<String>,
}

impl QueryHit {
    /// Similarity in [0, 1] under the given interpretation
    #[must_use]
    pub fn similarity(&self, mode: SimilarityMode) -> f64 {
        let value = match mode {
            SimilarityMode::Similarity => self.similarity,
            SimilarityMode::Distance => 1.0 - self.similarity,
        };
        value.clamp(0.0, 1.0)
    }

    /// Similarity as a rounded percentage
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn similarity_percent(&self, mode: SimilarityMode) -> u8 {
        // Clamped to [0, 1] above, so the product fits in u8
        (self.similarity(mode) * 100.0).round() as u8
    }

    /// Text of the hit: `memory_content`, or `document` from vector-store backends
    #[must_use]
    pub fn content(&self) -> &str {
        self.memory_content
            .as_deref()
            .or(self.document.as_deref())
            .unwrap_or_default()
    }
}

/// Query response payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResults {
    /// Hits, best first
    #[serde(default)]
    pub results: Vec<QueryHit>,
}

/// POST `/api/memory/query`
pub fn query_memories(query: &MemoryQuery) -> Result<RequestDescriptor> {
    let user_id = require_text("user_id", &query.user_id)?;
    let app_name = require_text("app_name", &query.app_name)?;
    let text = require_text("query", &query.query)?;
    if text.chars().count() < 2 {
        return Err(Error::validation("query must be at least 2 characters"));
    }
    require_range("top_k", query.top_k, 1, 20)?;

    RequestDescriptor::post("/api/memory/query")?.with_json(&MemoryQuery {
        user_id,
        app_name,
        query: text,
        top_k: query.top_k,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(text: &str, top_k: u32) -> MemoryQuery {
        MemoryQuery {
            user_id: "u1".into(),
            app_name: "a1".into(),
            query: text.into(),
            top_k,
        }
    }

    #[test]
    fn builds_query_body() {
        let descriptor = query_memories(&query(" favourite drink ", 5)).unwrap();
        assert_eq!(descriptor.path(), "/api/memory/query");
        assert_eq!(descriptor.payload()["query"], "favourite drink");
        assert_eq!(descriptor.payload()["top_k"], json!(5));
    }

    #[test]
    fn validates_query_length_and_top_k() {
        assert!(query_memories(&query("a", 5)).is_err());
        assert!(query_memories(&query("茶叶", 5)).is_ok());
        assert!(query_memories(&query("tea", 0)).is_err());
        assert!(query_memories(&query("tea", 21)).is_err());
        assert!(query_memories(&query("tea", 20)).is_ok());
    }

    #[test]
    fn converts_distance_to_similarity() {
        let hit: QueryHit = serde_json::from_value(json!({
            "memory_id": 3,
            "document": "likes green tea",
            "similarity": 0.25
        }))
        .unwrap();

        assert!((hit.similarity(SimilarityMode::Similarity) - 0.25).abs() < f64::EPSILON);
        assert!((hit.similarity(SimilarityMode::Distance) - 0.75).abs() < f64::EPSILON);
        assert_eq!(hit.similarity_percent(SimilarityMode::Distance), 75);
        assert_eq!(hit.content(), "likes green tea");
    }

    #[test]
    fn memory_content_wins_over_document() {
        let hit: QueryHit = serde_json::from_value(json!({
            "memory_id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
            "memory_content": "prefers oolong",
            "document": "raw chunk text",
            "similarity": 0.9
        }))
        .unwrap();
        assert_eq!(hit.content(), "prefers oolong");
    }

    #[test]
    fn clamps_out_of_range_distances() {
        let hit: QueryHit = serde_json::from_value(json!({
            "memory_id": 4,
            "memory_content": "far away",
            "similarity": 1.4
        }))
        .unwrap();
        assert_eq!(hit.similarity_percent(SimilarityMode::Distance), 0);
        assert_eq!(hit.similarity_percent(SimilarityMode::Similarity), 100);
        assert_eq!(hit.content(), "far away");
    }
}
