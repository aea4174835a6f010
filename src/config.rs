//! Configuration management

use std::{collections::HashMap, env, path::Path, sync::LazyLock, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::SimilarityMode;
use crate::{Error, Result};

/// Prefix for environment overrides, e.g. `MEMORY_CONSOLE_BACKEND__BASE_URL`
pub const ENV_PREFIX: &str = "MEMORY_CONSOLE_";

// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("static pattern is valid")
});

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Backend connection
    pub backend: BackendConfig,
    /// Notification behaviour
    pub notifications: NotificationConfig,
    /// Query defaults
    pub query: QueryConfig,
}

impl Config {
    /// Load configuration from an optional YAML file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Env files must be in the process environment before ${VAR} expansion
        config.load_env_files();
        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!(path = %expanded, "Loaded env file"),
                    Err(e) => {
                        tracing::warn!(path = %expanded, error = %e, "Failed to load env file");
                    }
                }
            } else {
                tracing::debug!(path = %expanded, "Env file not found (skipped)");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in config values
    fn expand_env_vars(&mut self) {
        self.backend.base_url = expand_string(&self.backend.base_url);
        for value in self.backend.headers.values_mut() {
            *value = expand_string(value);
        }
    }

    /// Reject values that would only fail later at request time
    pub fn validate(&self) -> Result<()> {
        let base = self.backend.base_url.trim();
        if base.is_empty() {
            return Err(Error::Config("backend.base_url must not be empty".into()));
        }
        let parsed = url::Url::parse(base)
            .map_err(|e| Error::Config(format!("Invalid backend.base_url '{base}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "backend.base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.backend.timeout.is_zero() {
            return Err(Error::Config("backend.timeout must be greater than zero".into()));
        }
        if self.notifications.dismiss_after.is_zero() {
            return Err(Error::Config(
                "notifications.dismiss_after must be greater than zero".into(),
            ));
        }
        if !(1..=20).contains(&self.query.default_top_k) {
            return Err(Error::Config(
                "query.default_top_k must be between 1 and 20".into(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string
fn expand_string(value: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL the API paths are appended to
    pub base_url: String,
    /// Request timeout, enforced by the HTTP client
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Extra HTTP headers (e.g. authorization), `${VAR}` expanded
    pub headers: HashMap<String, String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout: Duration::from_secs(30),
            headers: HashMap::new(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// How long a message stays visible before it is dismissed automatically
    #[serde(with = "humantime_serde")]
    pub dismiss_after: Duration,
    /// Use ANSI colors when rendering to a terminal
    pub color: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dismiss_after: Duration::from_millis(5000),
            color: true,
        }
    }
}

/// Query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How the backend reports the `similarity` field
    pub similarity_mode: SimilarityMode,
    /// Result count used when none is given
    pub default_top_k: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            similarity_mode: SimilarityMode::Similarity,
            default_top_k: 5,
        }
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to a human-readable string ("30s", or "250ms" below a second)
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Parse "30s", "5m", "100ms" or a bare number of seconds
    ///
    /// # Errors
    ///
    /// Returns a description of the problem for malformed or out-of-range input.
    pub fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let number = |digits: &str| {
            digits
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid duration '{s}': {e}"))
        };
        // "ms" must be checked before the single-letter suffixes
        if let Some(ms) = s.strip_suffix("ms") {
            number(ms).map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            number(secs).map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            number(mins)?
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| format!("duration '{s}' is too large"))
        } else {
            number(s).map(Duration::from_secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_console_behaviour() {
        let config = Config::default();
        assert_eq!(config.notifications.dismiss_after, Duration::from_millis(5000));
        assert_eq!(config.backend.timeout, Duration::from_secs(30));
        assert_eq!(config.query.default_top_k, 5);
        assert_eq!(config.query.similarity_mode, SimilarityMode::Similarity);
        config.validate().unwrap();
    }

    #[test]
    fn load_env_files_sets_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("test.env");
        let mut f = std::fs::File::create(&env_path).unwrap();
        writeln!(f, "MEMORY_CONSOLE_TEST_TOKEN_A=from_env_file").unwrap();
        drop(f);

        let config = Config {
            env_files: vec![env_path.to_string_lossy().to_string()],
            ..Default::default()
        };
        config.load_env_files();

        assert_eq!(
            env::var("MEMORY_CONSOLE_TEST_TOKEN_A").unwrap(),
            "from_env_file"
        );
    }

    #[test]
    fn load_env_files_skips_missing() {
        let config = Config {
            env_files: vec!["/nonexistent/path/.env".to_string()],
            ..Default::default()
        };
        config.load_env_files();
    }

    #[test]
    fn expands_header_placeholders_with_defaults() {
        let mut config = Config::default();
        config.backend.headers.insert(
            "Authorization".into(),
            "Bearer ${MEMORY_CONSOLE_TEST_UNSET_TOKEN:-anonymous}".into(),
        );
        config.expand_env_vars();
        assert_eq!(config.backend.headers["Authorization"], "Bearer anonymous");
    }

    #[test]
    fn loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.yaml");
        std::fs::write(
            &path,
            r#"
backend:
  base_url: "http://memory.internal:9000"
  timeout: "10s"
notifications:
  dismiss_after: "1500ms"
  color: false
query:
  similarity_mode: distance
  default_top_k: 8
"#,
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.backend.base_url, "http://memory.internal:9000");
        assert_eq!(config.backend.timeout, Duration::from_secs(10));
        assert_eq!(config.notifications.dismiss_after, Duration::from_millis(1500));
        assert!(!config.notifications.color);
        assert_eq!(config.query.similarity_mode, SimilarityMode::Distance);
        assert_eq!(config.query.default_top_k, 8);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/console.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut config = Config::default();
        config.backend.base_url = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.backend.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(humantime_serde::parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(humantime_serde::parse("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(humantime_serde::parse("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(humantime_serde::parse("7").unwrap(), Duration::from_secs(7));
        assert!(humantime_serde::parse("soon").is_err());
    }

    #[test]
    fn oversized_minutes_are_rejected() {
        let err = humantime_serde::parse(&format!("{}m", u64::MAX)).unwrap_err();
        assert!(err.contains("too large"));
        assert!(humantime_serde::parse(&format!("{}m", u64::MAX / 60)).is_ok());
    }

    #[test]
    fn rejects_zero_durations() {
        let mut config = Config::default();
        config.notifications.dismiss_after = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.backend.timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn env_files_deserialized_from_yaml() {
        let yaml = r#"
env_files:
  - ~/.config/memory-console/secrets.env
backend:
  base_url: "http://127.0.0.1:8001"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.env_files.len(), 1);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8001");
    }
}
