//! Request gateway
//!
//! Every backend call goes through [`RequestGateway::send`]: it shows the
//! loading indicator, dispatches the request, normalizes the reply into a
//! [`CanonicalResponse`] and fires exactly one terminal action.

mod descriptor;

pub use descriptor::{Handler, RequestDescriptor};

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::Result;
use crate::config::Config;
use crate::notification::NotificationCenter;
use crate::protocol::{CanonicalResponse, normalize_reply, reason_phrase};
use crate::transport::{HttpTransport, OutboundRequest, RawReply, Transport};

use descriptor::Handlers;

/// Which terminal action a `send` ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The caller's success handler ran
    SuccessHandler,
    /// The caller's error handler ran
    ErrorHandler,
    /// No success handler; a success notification was shown
    SuccessNotice,
    /// No error handler; an error notification was shown
    ErrorNotice,
}

impl Completion {
    /// Whether the request succeeded
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::SuccessHandler | Self::SuccessNotice)
    }
}

/// Uniform front door to the backend
#[derive(Clone)]
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    notifications: NotificationCenter,
}

impl RequestGateway {
    /// Create a gateway over any transport
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, notifications: NotificationCenter) -> Self {
        Self {
            transport,
            notifications,
        }
    }

    /// Create an HTTP gateway from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(&config.backend)?;
        Ok(Self::new(
            Arc::new(transport),
            NotificationCenter::from_config(&config.notifications),
        ))
    }

    /// The notification center this gateway drives
    #[must_use]
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Send a request and run exactly one terminal action.
    ///
    /// Succeeded goes to the success handler, or a success notification when
    /// there is none. Failed goes to the error handler, or an error
    /// notification. The loading indicator is gone before either runs.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Completion {
        let (request, handlers) = descriptor.into_parts();
        let response = self.resolve(&request).await;
        self.complete(response, handlers)
    }

    /// Dispatch and normalize without any terminal action.
    ///
    /// Shows the loading indicator for the duration of the call. It is
    /// removed even if this future is dropped before completion.
    #[tracing::instrument(
        skip_all,
        fields(request_id = %Uuid::new_v4(), method = %request.method, path = %request.path)
    )]
    pub async fn resolve(&self, request: &OutboundRequest) -> CanonicalResponse {
        let loading = LoadingGuard::show(&self.notifications);

        let response = match self.transport.dispatch(request).await {
            Ok(reply) => interpret_reply(reply),
            Err(e) => CanonicalResponse::transport_failure(None, None, &e.to_string()),
        };

        drop(loading);

        debug!(
            success = response.is_success(),
            status = ?response.status_code(),
            "Request resolved"
        );
        response
    }

    fn complete(&self, response: CanonicalResponse, handlers: Handlers) -> Completion {
        let Handlers {
            on_success,
            on_error,
        } = handlers;

        if response.is_success() {
            match on_success {
                Some(handler) => {
                    handler(response);
                    Completion::SuccessHandler
                }
                None => {
                    self.notifications.show_success(response.notice_text());
                    Completion::SuccessNotice
                }
            }
        } else {
            match on_error {
                Some(handler) => {
                    handler(response);
                    Completion::ErrorHandler
                }
                None => {
                    self.notifications.show_error(response.notice_text());
                    Completion::ErrorNotice
                }
            }
        }
    }
}

/// Turn a raw reply into the canonical form
#[must_use]
pub fn interpret_reply(reply: RawReply) -> CanonicalResponse {
    if !reply.is_success() {
        return CanonicalResponse::transport_failure(
            Some(reply.status),
            Some(&reply.body),
            reason_phrase(reply.status),
        );
    }

    if reply.body.trim().is_empty() {
        return normalize_reply(serde_json::Value::Null);
    }

    match serde_json::from_str(&reply.body) {
        Ok(raw) => normalize_reply(raw),
        Err(e) => CanonicalResponse::transport_failure(
            Some(reply.status),
            Some(&reply.body),
            &format!("malformed response: {e}"),
        ),
    }
}

/// Keeps the loading indicator up while alive
struct LoadingGuard<'a> {
    center: &'a NotificationCenter,
}

impl<'a> LoadingGuard<'a> {
    fn show(center: &'a NotificationCenter) -> Self {
        center.show_loading();
        Self { center }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.center.hide_loading();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MessageKind;
    use crate::protocol::DEFAULT_SUCCESS_MESSAGE;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::oneshot;

    /// Answers every request with the same reply
    struct CannedTransport(RawReply);

    #[async_trait]
    impl Transport for CannedTransport {
        async fn dispatch(&self, _request: &OutboundRequest) -> Result<RawReply> {
            Ok(self.0.clone())
        }
    }

    fn canned_gateway(status: u16, body: &str) -> RequestGateway {
        RequestGateway::new(
            Arc::new(CannedTransport(reply(status, body))),
            NotificationCenter::default(),
        )
    }

    fn reply(status: u16, body: &str) -> RawReply {
        RawReply {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn interprets_envelope() {
        let response = interpret_reply(reply(
            200,
            r#"{"success":true,"message":"ok","data":{"memory_id":42}}"#,
        ));
        assert_eq!(
            response,
            CanonicalResponse::succeeded("ok", json!({"memory_id": 42}))
        );
    }

    #[test]
    fn empty_success_body_is_null_data() {
        let response = interpret_reply(reply(204, ""));
        assert!(response.is_success());
        assert_eq!(response.data(), &serde_json::Value::Null);
    }

    #[test]
    fn malformed_success_body_is_a_transport_failure() {
        let response = interpret_reply(reply(200, "<html>proxy login</html>"));
        assert!(!response.is_success());
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.message(), "<html>proxy login</html> (status code: 200)");
    }

    #[test]
    fn error_status_uses_detail() {
        let response = interpret_reply(reply(500, r#"{"detail":"db down"}"#));
        assert_eq!(response.status_code(), Some(500));
        assert_eq!(response.message(), "db down (status code: 500)");
    }

    #[test]
    fn error_status_without_body_uses_reason_phrase() {
        let response = interpret_reply(reply(404, ""));
        assert_eq!(response.message(), "Not Found (status code: 404)");
    }

    #[tokio::test]
    async fn blank_message_reaches_handler_unchanged() {
        let gateway =
            canned_gateway(200, r#"{"success":true,"message":"","data":{"memory_id":42}}"#);
        let (tx, rx) = oneshot::channel();
        let descriptor = RequestDescriptor::post("/api/memory/submit")
            .unwrap()
            .on_success(move |response| {
                let _ = tx.send(response);
            });

        assert_eq!(gateway.send(descriptor).await, Completion::SuccessHandler);
        let response = rx.await.unwrap();
        assert_eq!(response.message(), "");
        assert_eq!(response.data(), &json!({"memory_id": 42}));
    }

    #[tokio::test]
    async fn blank_message_notice_uses_default_wording() {
        let gateway = canned_gateway(200, r#"{"success":true,"message":""}"#);
        let descriptor = RequestDescriptor::put("/api/memory/config").unwrap();

        assert_eq!(gateway.send(descriptor).await, Completion::SuccessNotice);
        let current = gateway.notifications().current().unwrap();
        assert_eq!(current.kind(), Some(MessageKind::Success));
        assert_eq!(current.text(), Some(DEFAULT_SUCCESS_MESSAGE));
    }

    #[test]
    fn completion_success_flag() {
        assert!(Completion::SuccessHandler.is_success());
        assert!(Completion::SuccessNotice.is_success());
        assert!(!Completion::ErrorHandler.is_success());
        assert!(!Completion::ErrorNotice.is_success());
    }
}
