//! Request descriptors

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol::{CanonicalResponse, Verb};
use crate::transport::OutboundRequest;
use crate::{Error, Result};

/// Completion handler. Runs at most once, with the normalized response.
pub type Handler = Box<dyn FnOnce(CanonicalResponse) + Send + 'static>;

/// Handlers detached from a descriptor
#[derive(Default)]
pub(crate) struct Handlers {
    pub(crate) on_success: Option<Handler>,
    pub(crate) on_error: Option<Handler>,
}

/// Everything the gateway needs for one call.
///
/// The path is validated on construction, so a descriptor that exists can
/// always be sent.
pub struct RequestDescriptor {
    request: OutboundRequest,
    handlers: Handlers,
}

impl RequestDescriptor {
    /// Create a descriptor with an empty payload
    pub fn new(method: Verb, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        validate_path(&path)?;
        Ok(Self {
            request: OutboundRequest {
                method,
                path,
                query: Vec::new(),
                payload: Map::new(),
            },
            handlers: Handlers::default(),
        })
    }

    /// GET descriptor
    pub fn get(path: impl Into<String>) -> Result<Self> {
        Self::new(Verb::Get, path)
    }

    /// POST descriptor
    pub fn post(path: impl Into<String>) -> Result<Self> {
        Self::new(Verb::Post, path)
    }

    /// PUT descriptor
    pub fn put(path: impl Into<String>) -> Result<Self> {
        Self::new(Verb::Put, path)
    }

    /// DELETE descriptor
    pub fn delete(path: impl Into<String>) -> Result<Self> {
        Self::new(Verb::Delete, path)
    }

    /// Replace the payload
    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.request.payload = payload;
        self
    }

    /// Replace the payload with a serializable value; it must serialize to an object
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(self.with_payload(map)),
            other => Err(Error::validation(format!(
                "request payload must be a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }

    /// Add a parameter that travels in the URL for every verb
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((key.into(), value.into()));
        self
    }

    /// Handler for a successful outcome
    #[must_use]
    pub fn on_success(mut self, handler: impl FnOnce(CanonicalResponse) + Send + 'static) -> Self {
        self.handlers.on_success = Some(Box::new(handler));
        self
    }

    /// Handler for a failed outcome (transport or application)
    #[must_use]
    pub fn on_error(mut self, handler: impl FnOnce(CanonicalResponse) + Send + 'static) -> Self {
        self.handlers.on_error = Some(Box::new(handler));
        self
    }

    /// HTTP verb
    #[must_use]
    pub fn method(&self) -> Verb {
        self.request.method
    }

    /// Endpoint path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Payload
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.request.payload
    }

    /// Explicit query parameters
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.request.query
    }

    /// The request as a transport sees it
    #[must_use]
    pub fn request(&self) -> &OutboundRequest {
        &self.request
    }

    pub(crate) fn into_parts(self) -> (OutboundRequest, Handlers) {
        (self.request, self.handlers)
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("request", &self.request)
            .field("on_success", &self.handlers.on_success.is_some())
            .field("on_error", &self.handlers.on_error.is_some())
            .finish()
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::validation("request path must not be empty"));
    }
    if !path.starts_with('/') {
        return Err(Error::validation(format!(
            "request path must start with '/': {path}"
        )));
    }
    if path.contains(['?', '#']) || path.chars().any(char::is_whitespace) {
        return Err(Error::validation(format!(
            "request path must be a bare path without query, fragment or whitespace: {path}"
        )));
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
