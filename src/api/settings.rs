//! Per-user and per-application memory configuration

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{require_range, require_text, require_unit_interval, scoped_get};
use crate::gateway::RequestDescriptor;
use crate::{Error, Result};

const USER_CONFIG_PATH: &str = "/api/memory/config";
const APP_CONFIG_PATH: &str = "/api/memory/app/config";

/// When user-scoped memories expire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStrategy {
    /// Keep forever
    Never,
    /// Expire a fixed number of days after the last access
    LastAccess,
}

impl fmt::Display for ExpiryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Never => "never",
            Self::LastAccess => "last_access",
        })
    }
}

impl FromStr for ExpiryStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "never" => Ok(Self::Never),
            "last_access" => Ok(Self::LastAccess),
            other => Err(Error::validation(format!(
                "expiry_strategy must be 'never' or 'last_access', got '{other}'"
            ))),
        }
    }
}

/// Partial update of a user/app configuration; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfigUpdate {
    /// Prompt used for element extraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_prompt: Option<String>,
    /// Similarity above which memories are merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_threshold: Option<f64>,
    /// Expiry strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_strategy: Option<ExpiryStrategy>,
    /// Days until expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<u32>,
}

impl MemoryConfigUpdate {
    fn is_empty(&self) -> bool {
        self.extraction_prompt.is_none()
            && self.merge_threshold.is_none()
            && self.expiry_strategy.is_none()
            && self.expiry_days.is_none()
    }
}

/// Stored user/app configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryConfigRecord {
    /// Row id
    #[serde(default)]
    pub id: Option<i64>,
    /// Owner
    pub user_id: String,
    /// Application
    pub app_name: String,
    /// Extraction prompt
    #[serde(default)]
    pub extraction_prompt: String,
    /// Merge threshold
    #[serde(default)]
    pub merge_threshold: f64,
    /// Expiry strategy as stored
    #[serde(default)]
    pub expiry_strategy: String,
    /// Days until expiry
    #[serde(default)]
    pub expiry_days: u32,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update time
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// User config response payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserConfig {
    /// The configuration
    pub config: MemoryConfigRecord,
}

/// Weights of the memory priority score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    /// Weight of content length
    pub content_length: f64,
    /// Weight of extracted element count
    pub element_count: f64,
    /// Weight of access frequency
    pub access_frequency: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            content_length: 0.3,
            element_count: 0.4,
            access_frequency: 0.3,
        }
    }
}

impl PriorityWeights {
    /// Sum of the three weights
    #[must_use]
    pub fn total(&self) -> f64 {
        self.content_length + self.element_count + self.access_frequency
    }

    /// Whether the weights sum to roughly 1.0 (within 0.1)
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        (self.total() - 1.0).abs() <= 0.1
    }
}

/// Application configuration as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application
    pub app_name: String,
    /// Extraction template
    #[serde(default)]
    pub extraction_template: Option<String>,
    /// Field name to description
    #[serde(default)]
    pub extraction_fields: Option<BTreeMap<String, Value>>,
    /// Conversation rounds between memory updates
    #[serde(default)]
    pub conversation_rounds: Option<u32>,
    /// Maximum summary length
    #[serde(default)]
    pub max_summary_length: Option<u32>,
    /// Summarize automatically
    #[serde(default)]
    pub enable_auto_summarize: Option<bool>,
    /// Extract elements
    #[serde(default)]
    pub enable_element_extraction: Option<bool>,
    /// Similarity threshold
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
    /// Priority weights
    #[serde(default)]
    pub priority_weights: Option<PriorityWeights>,
    /// Fields this client does not model
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partial update of an application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfigUpdate {
    /// Extraction template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_template: Option<String>,
    /// Field name to description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_fields: Option<BTreeMap<String, String>>,
    /// Conversation rounds between memory updates, 1 to 20
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_rounds: Option<u32>,
    /// Maximum summary length, 100 to 2000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_summary_length: Option<u32>,
    /// Similarity threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
    /// Summarize automatically
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_auto_summarize: Option<bool>,
    /// Extract elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_element_extraction: Option<bool>,
    /// Priority weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_weights: Option<PriorityWeights>,
    /// Merge strategy, passed through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<String>,
    /// Merge threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_threshold: Option<f64>,
    /// Merge window, 5 to 1440 minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_window_minutes: Option<u32>,
    /// Expiry strategy, passed through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_strategy: Option<String>,
    /// Days until expiry, 1 to 365
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<u32>,
    /// Memory count limit, 100 to 10000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u32>,
    /// Semantic scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_semantic_scoring: Option<bool>,
    /// Weight of access frequency in the score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_score_weight: Option<f64>,
    /// Weight of priority in the score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score_weight: Option<f64>,
    /// Weight of recency in the score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recency_score_weight: Option<f64>,
}

impl AppConfigUpdate {
    /// Check ranges; returns advisory warnings that do not block the update
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if let Some(fields) = &self.extraction_fields {
            for (name, description) in fields {
                if name.trim().is_empty() || description.trim().is_empty() {
                    return Err(Error::validation(
                        "extraction field names and descriptions must not be empty",
                    ));
                }
            }
        }

        let ranges = [
            ("conversation_rounds", self.conversation_rounds, 1, 20),
            ("max_summary_length", self.max_summary_length, 100, 2000),
            ("merge_window_minutes", self.merge_window_minutes, 5, 1440),
            ("expiry_days", self.expiry_days, 1, 365),
            ("memory_limit", self.memory_limit, 100, 10_000),
        ];
        for (field, value, min, max) in ranges {
            if let Some(value) = value {
                require_range(field, value, min, max)?;
            }
        }

        let unit = [
            ("similarity_threshold", self.similarity_threshold),
            ("merge_threshold", self.merge_threshold),
            ("access_score_weight", self.access_score_weight),
            ("priority_score_weight", self.priority_score_weight),
            ("recency_score_weight", self.recency_score_weight),
        ];
        for (field, value) in unit {
            if let Some(value) = value {
                require_unit_interval(field, value)?;
            }
        }

        if let Some(weights) = &self.priority_weights {
            require_unit_interval("priority_weights.content_length", weights.content_length)?;
            require_unit_interval("priority_weights.element_count", weights.element_count)?;
            require_unit_interval("priority_weights.access_frequency", weights.access_frequency)?;
            if !weights.is_balanced() {
                warnings.push(format!(
                    "priority weights sum to {:.2}; a total close to 1.0 is recommended",
                    weights.total()
                ));
            }
        }

        Ok(warnings)
    }
}

/// GET `/api/memory/config`
pub fn get_user_config(user_id: &str, app_name: &str) -> Result<RequestDescriptor> {
    scoped_get(USER_CONFIG_PATH, user_id, app_name)
}

/// PUT `/api/memory/config` with the owner in the query string
pub fn update_user_config(
    user_id: &str,
    app_name: &str,
    update: &MemoryConfigUpdate,
) -> Result<RequestDescriptor> {
    let user_id = require_text("user_id", user_id)?;
    let app_name = require_text("app_name", app_name)?;
    if update.is_empty() {
        return Err(Error::validation("nothing to update"));
    }
    if let Some(threshold) = update.merge_threshold {
        require_unit_interval("merge_threshold", threshold)?;
    }
    if update.expiry_days == Some(0) {
        return Err(Error::validation("expiry_days must be at least 1"));
    }

    Ok(RequestDescriptor::put(USER_CONFIG_PATH)?
        .with_query("user_id", user_id)
        .with_query("app_name", app_name)
        .with_json(update)?)
}

/// GET `/api/memory/app/config`; `None` lists every application
pub fn get_app_config(app_name: Option<&str>) -> Result<RequestDescriptor> {
    let descriptor = RequestDescriptor::get(APP_CONFIG_PATH)?;
    match app_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => descriptor.with_json(&serde_json::json!({ "app_name": name })),
        None => Ok(descriptor),
    }
}

/// PUT `/api/memory/app/config` with the application in the query string.
///
/// Also returns the advisory warnings from [`AppConfigUpdate::validate`].
pub fn update_app_config(
    app_name: &str,
    update: &AppConfigUpdate,
) -> Result<(RequestDescriptor, Vec<String>)> {
    let app_name = require_text("app_name", app_name)?;
    let warnings = update.validate()?;
    let descriptor = RequestDescriptor::put(APP_CONFIG_PATH)?
        .with_query("app_name", app_name)
        .with_json(update)?;
    Ok((descriptor, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Verb;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn user_config_update_uses_query_owner_and_body() {
        let descriptor = update_user_config(
            "u1",
            "a1",
            &MemoryConfigUpdate {
                merge_threshold: Some(0.7),
                expiry_strategy: Some(ExpiryStrategy::LastAccess),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(descriptor.method(), Verb::Put);
        assert_eq!(
            descriptor.query(),
            &[
                ("user_id".to_string(), "u1".to_string()),
                ("app_name".to_string(), "a1".to_string())
            ]
        );
        assert_eq!(
            serde_json::Value::Object(descriptor.payload().clone()),
            json!({"merge_threshold": 0.7, "expiry_strategy": "last_access"})
        );
    }

    #[test]
    fn user_config_update_validates_ranges() {
        let update = |u: MemoryConfigUpdate| update_user_config("u1", "a1", &u);
        assert!(update(MemoryConfigUpdate::default()).is_err());
        assert!(
            update(MemoryConfigUpdate {
                merge_threshold: Some(1.5),
                ..Default::default()
            })
            .is_err()
        );
        assert!(
            update(MemoryConfigUpdate {
                expiry_days: Some(0),
                ..Default::default()
            })
            .is_err()
        );
    }

    #[test]
    fn parses_expiry_strategy() {
        assert_eq!("never".parse::<ExpiryStrategy>().unwrap(), ExpiryStrategy::Never);
        assert_eq!(ExpiryStrategy::LastAccess.to_string(), "last_access");
        assert!("sometimes".parse::<ExpiryStrategy>().is_err());
    }

    #[test]
    fn app_config_get_is_optionally_scoped() {
        assert!(get_app_config(None).unwrap().payload().is_empty());
        assert!(get_app_config(Some("  ")).unwrap().payload().is_empty());
        assert_eq!(get_app_config(Some("a1")).unwrap().payload()["app_name"], "a1");
    }

    #[test]
    fn app_config_update_reports_unbalanced_weights() {
        let (descriptor, warnings) = update_app_config(
            "a1",
            &AppConfigUpdate {
                priority_weights: Some(PriorityWeights {
                    content_length: 0.6,
                    element_count: 0.6,
                    access_frequency: 0.3,
                }),
                merge_strategy: Some("similarity".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(descriptor.query(), &[("app_name".to_string(), "a1".to_string())]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("1.50"));
    }

    #[test]
    fn app_config_update_rejects_out_of_range_values() {
        let bad_rounds = AppConfigUpdate {
            conversation_rounds: Some(40),
            ..Default::default()
        };
        assert!(update_app_config("a1", &bad_rounds).is_err());

        let bad_weight = AppConfigUpdate {
            recency_score_weight: Some(-0.1),
            ..Default::default()
        };
        assert!(update_app_config("a1", &bad_weight).is_err());

        let mut fields = BTreeMap::new();
        fields.insert("user_intent".to_string(), " ".to_string());
        let bad_field = AppConfigUpdate {
            extraction_fields: Some(fields),
            ..Default::default()
        };
        assert!(update_app_config("a1", &bad_field).is_err());
    }

    #[test]
    fn app_config_update_rejects_unknown_keys_from_files() {
        let parsed: std::result::Result<AppConfigUpdate, _> =
            serde_yaml::from_str("merge_treshold: 0.5\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn app_config_keeps_unmodelled_fields() {
        let config: AppConfig = serde_json::from_value(json!({
            "app_name": "a1",
            "priority_weights": {"content_length": 0.3, "element_count": 0.4, "access_frequency": 0.3},
            "memory_limit": 500
        }))
        .unwrap();
        assert!(config.priority_weights.unwrap().is_balanced());
        assert_eq!(config.extra["memory_limit"], json!(500));
    }
}
