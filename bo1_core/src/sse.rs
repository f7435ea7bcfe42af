//! Server-Sent Events (SSE) transport.
//!
//! Provides a lightweight wrapper over reqwest + eventsource-stream behind the
//! [`EventTransport`] trait, so the connection manager can be driven by a
//! scripted transport in tests.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use url::Url;

use crate::errors::CoreError;
use crate::streaming::version::SCHEMA_VERSION_HEADER;
use crate::streaming::StreamClientConfig;

const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: String,
    pub retry: Option<std::time::Duration>,
}

impl SseEvent {
    /// Create a named frame with no id.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: String::new(),
            retry: None,
        }
    }

    /// Set the frame id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Stream of SSE events.
pub type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent, CoreError>> + Send>>;

/// Request to open a session stream.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub url: Url,
    /// Id of the last frame seen, sent as `Last-Event-ID` on resume.
    pub last_event_id: Option<String>,
}

/// An open event stream.
pub struct OpenedStream {
    /// Raw `X-SSE-Schema-Version` header value, if the server sent one.
    pub schema_version: Option<String>,
    pub events: SseStream,
}

/// Opens server-push event streams.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open a stream. Errors here count as transport failures.
    async fn open(&self, request: &StreamRequest) -> Result<OpenedStream, CoreError>;
}

/// HTTP transport using reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from client config.
    ///
    /// Only the connect phase has a timeout; the stream itself is long-lived
    /// and idle detection is handled by the connection manager.
    pub fn new(config: &StreamClientConfig) -> Result<Self, CoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if let Some(ref api_key) = config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|_| CoreError::config("invalid api key characters"))?,
            );
        }
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn open(&self, request: &StreamRequest) -> Result<OpenedStream, CoreError> {
        let mut req = self.client.get(request.url.clone());
        if let Some(ref id) = request.last_event_id {
            req = req.header(LAST_EVENT_ID_HEADER, id.as_str());
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::http_response(
                status.as_u16(),
                request.url.as_str(),
                "sse_stream_failed",
                Some(&body),
            ));
        }

        let schema_version = resp
            .headers()
            .get(SCHEMA_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let events = resp.bytes_stream().eventsource().map(|item| match item {
            Ok(evt) => Ok(SseEvent {
                event: evt.event,
                data: evt.data,
                id: evt.id,
                retry: evt.retry,
            }),
            Err(err) => Err(CoreError::Protocol(err.to_string())),
        });

        Ok(OpenedStream {
            schema_version,
            events: Box::pin(events),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_builds() {
        let config = StreamClientConfig::default().with_api_key("bo1_key");
        assert!(HttpTransport::new(&config).is_ok());
    }

    #[test]
    fn test_rejects_unprintable_api_key() {
        let config = StreamClientConfig::default().with_api_key("bad\nkey");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_frame_builder() {
        let frame = SseEvent::new("contribution", "{}").with_id("7");
        assert_eq!(frame.event, "contribution");
        assert_eq!(frame.id, "7");
        assert!(frame.retry.is_none());
    }
}
