//! Transport implementations for the memory backend

mod http;

pub use self::http::HttpTransport;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;
use crate::protocol::Verb;

/// One outbound call, as handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// HTTP verb
    pub method: Verb,
    /// Endpoint path, always starting with `/`
    pub path: String,
    /// Parameters that always travel in the URL, regardless of verb
    pub query: Vec<(String, String)>,
    /// Request payload (query string for GET, JSON body otherwise)
    pub payload: Map<String, Value>,
}

impl OutboundRequest {
    /// Every query pair the request carries, payload included for GET
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.query.clone();
        if self.method.encodes_payload_in_query() {
            pairs.extend(encode_query(&self.payload));
        }
        pairs
    }

    /// JSON body, absent for GET
    #[must_use]
    pub fn body(&self) -> Option<Value> {
        if self.method.encodes_payload_in_query() {
            None
        } else {
            Some(Value::Object(self.payload.clone()))
        }
    }
}

/// What came back over the wire, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl RawReply {
    /// Whether the status is in the 2xx range
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait for backend communication
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the raw reply.
    ///
    /// Any status code is an `Ok`; `Err` means no HTTP response was obtained.
    async fn dispatch(&self, request: &OutboundRequest) -> Result<RawReply>;
}

/// Flatten a payload into query pairs.
///
/// Scalars use their text form, `null` becomes an empty value and nested
/// arrays or objects are sent as compact JSON.
#[must_use]
pub fn encode_query(payload: &Map<String, Value>) -> Vec<(String, String)> {
    payload
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn encodes_scalars_and_nested_values() {
        let pairs = encode_query(&payload(json!({
            "user_id": "u1",
            "top_k": 5,
            "active": true,
            "session_id": null,
            "tags": ["a", "b"]
        })));

        assert!(pairs.contains(&("user_id".into(), "u1".into())));
        assert!(pairs.contains(&("top_k".into(), "5".into())));
        assert!(pairs.contains(&("active".into(), "true".into())));
        assert!(pairs.contains(&("session_id".into(), String::new())));
        assert!(pairs.contains(&("tags".into(), r#"["a","b"]"#.into())));
    }

    #[test]
    fn get_requests_carry_payload_in_query_only() {
        let request = OutboundRequest {
            method: Verb::Get,
            path: "/api/memory/list".into(),
            query: vec![],
            payload: payload(json!({"user_id": "u1"})),
        };
        assert_eq!(request.query_pairs(), vec![("user_id".into(), "u1".into())]);
        assert_eq!(request.body(), None);
    }

    #[test]
    fn other_verbs_keep_explicit_query_and_send_body() {
        let request = OutboundRequest {
            method: Verb::Put,
            path: "/api/memory/app/config".into(),
            query: vec![("app_name".into(), "a1".into())],
            payload: payload(json!({"merge_threshold": 0.8})),
        };
        assert_eq!(request.query_pairs(), vec![("app_name".into(), "a1".into())]);
        assert_eq!(request.body(), Some(json!({"merge_threshold": 0.8})));
    }

    #[test]
    fn reply_success_range() {
        let reply = |status| RawReply {
            status,
            body: String::new(),
        };
        assert!(reply(200).is_success());
        assert!(reply(204).is_success());
        assert!(!reply(302).is_success());
        assert!(!reply(500).is_success());
    }
}
