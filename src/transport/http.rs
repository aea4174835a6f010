//! HTTP transport backed by `reqwest`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, Method,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tracing::{debug, warn};
use url::Url;

use super::{OutboundRequest, RawReply, Transport};
use crate::config::BackendConfig;
use crate::protocol::Verb;
use crate::{Error, Result};

/// HTTP transport for the memory backend
pub struct HttpTransport {
    /// HTTP client
    client: Client,
    /// Base URL, without trailing slash
    base_url: String,
    /// Headers sent with every request
    headers: HeaderMap,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(
        base_url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            base_url,
            headers: build_headers(headers),
        })
    }

    /// Create from the backend section of the configuration
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.base_url, &config.headers, config.timeout)
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path
    fn url_for(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::Transport(format!("Invalid request URL for '{path}': {e}")))
    }
}

fn method_of(verb: Verb) -> Method {
    match verb {
        Verb::Get => Method::GET,
        Verb::Post => Method::POST,
        Verb::Put => Method::PUT,
        Verb::Delete => Method::DELETE,
    }
}

fn build_headers(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        match (key.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            (Ok(k), Ok(v)) => {
                map.insert(k, v);
            }
            // Never log the value; it is usually a credential
            _ => warn!(header = %key, "Skipping invalid header"),
        }
    }
    map
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<RawReply> {
        let url = self.url_for(&request.path)?;
        let mut builder = self
            .client
            .request(method_of(request.method), url)
            .headers(self.headers.clone());

        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            builder = builder.query(&pairs);
        }
        if let Some(body) = request.body() {
            // Sets Content-Type: application/json
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Transport(format!("Request timed out: {e}"))
            } else {
                Error::Transport(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response body: {e}")))?;

        debug!(
            method = %request.method,
            path = %request.path,
            status,
            bytes = body.len(),
            "Received backend reply"
        );

        Ok(RawReply { status, body })
    }
}
