//! Response envelope normalization
//!
//! The backend is supposed to answer with `{ "success", "message", "data" }`,
//! but some routes return bare payloads and error replies come in whatever
//! shape the web framework produced. Everything downstream of the gateway
//! only ever sees a [`CanonicalResponse`].

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Message used when a successful reply carries none
pub const DEFAULT_SUCCESS_MESSAGE: &str = "operation succeeded";

/// Message used when a failed reply carries none
pub const DEFAULT_FAILURE_MESSAGE: &str = "operation failed";

/// The backend's standard reply envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Outcome flag
    pub success: bool,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Arbitrary payload
    #[serde(default)]
    pub data: Value,
}

/// Normalized outcome of one backend call
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalResponse {
    /// The backend accepted the request
    Succeeded {
        /// Human-readable message
        message: String,
        /// Response payload
        data: Value,
    },
    /// The backend, or the transport on its way there, rejected the request
    Failed {
        /// Human-readable message
        message: String,
        /// HTTP status, when the failure happened at the transport level
        status_code: Option<u16>,
        /// Payload attached to an application-level failure
        data: Value,
    },
}

impl CanonicalResponse {
    /// Build a successful response
    pub fn succeeded(message: impl Into<String>, data: Value) -> Self {
        Self::Succeeded {
            message: message.into(),
            data,
        }
    }

    /// Build a transport-level failure from whatever the reply offered
    #[must_use]
    pub fn transport_failure(status: Option<u16>, body: Option<&str>, reason: &str) -> Self {
        Self::Failed {
            message: describe_failure(status, body, reason),
            status_code: status,
            data: Value::Null,
        }
    }

    /// Whether this is a success
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Human-readable message
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Succeeded { message, .. } | Self::Failed { message, .. } => message,
        }
    }

    /// Response payload
    #[must_use]
    pub fn data(&self) -> &Value {
        match self {
            Self::Succeeded { data, .. } | Self::Failed { data, .. } => data,
        }
    }

    /// HTTP status of a transport failure
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { status_code, .. } => *status_code,
        }
    }

    /// Decode the payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(self.data())
            .map_err(|e| Error::Decode(format!("unexpected response payload: {e}")))
    }

    /// Text for a default notice: the message, or the stock wording when the
    /// backend sent a blank one
    #[must_use]
    pub fn notice_text(&self) -> &str {
        match self {
            Self::Succeeded { message, .. } if message.trim().is_empty() => DEFAULT_SUCCESS_MESSAGE,
            Self::Failed { message, .. } if message.trim().is_empty() => DEFAULT_FAILURE_MESSAGE,
            Self::Succeeded { message, .. } | Self::Failed { message, .. } => message,
        }
    }

    /// Re-wrap as the wire envelope
    #[must_use]
    pub fn into_envelope(self) -> Envelope {
        match self {
            Self::Succeeded { message, data } => Envelope {
                success: true,
                message,
                data,
            },
            Self::Failed { message, data, .. } => Envelope {
                success: false,
                message,
                data,
            },
        }
    }
}

impl From<Envelope> for CanonicalResponse {
    fn from(envelope: Envelope) -> Self {
        let Envelope {
            success,
            message,
            data,
        } = envelope;
        if success {
            Self::Succeeded { message, data }
        } else {
            Self::Failed {
                message,
                status_code: None,
                data,
            }
        }
    }
}

/// Normalize a parsed 2xx reply body.
///
/// An object carrying a `success` key is taken as an envelope; its message is
/// kept as sent and only a missing or `null` one gets the default wording.
/// Anything else is assumed successful and becomes the `data` of a
/// synthesized envelope.
#[must_use]
pub fn normalize_reply(raw: Value) -> CanonicalResponse {
    match raw {
        Value::Object(mut map) if map.contains_key("success") => {
            let success = map.remove("success").is_some_and(|flag| is_truthy(&flag));
            let message = match map.remove("message") {
                None | Some(Value::Null) if success => DEFAULT_SUCCESS_MESSAGE.to_string(),
                None | Some(Value::Null) => DEFAULT_FAILURE_MESSAGE.to_string(),
                Some(value) => text_of(value),
            };
            let data = map.remove("data").unwrap_or(Value::Null);
            Envelope {
                success,
                message,
                data,
            }
            .into()
        }
        other => CanonicalResponse::succeeded(DEFAULT_SUCCESS_MESSAGE, other),
    }
}

/// Build the message for a transport-level failure.
///
/// Priority: JSON `detail`, JSON `message`, bare JSON string, raw body text,
/// then `reason`. The status code (0 when no response arrived) is appended.
#[must_use]
pub fn describe_failure(status: Option<u16>, body: Option<&str>, reason: &str) -> String {
    let detail = body
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map_or_else(|| reason.to_string(), extract_detail);
    format!("{detail} (status code: {})", status.unwrap_or(0))
}

/// Canonical reason phrase for a status, used when the body says nothing
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("request failed")
}

fn extract_detail(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => field_text(&map, "detail")
            .or_else(|| field_text(&map, "message"))
            .unwrap_or_else(|| text.to_string()),
        Ok(Value::String(s)) if !s.is_empty() => s,
        _ => text.to_string(),
    }
}

fn field_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        value => Some(text_of(value.clone())),
    }
}

fn text_of(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Non-boolean flags follow the loose truthiness older backends relied on.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
