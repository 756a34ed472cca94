//! Chat platform integration
//!
//! The `ChatSink` trait is the seam between the relay and the chat platform:
//! post one placeholder message, then edit it in place. `HttpChatSink` talks
//! to the platform's web API; everything else in the crate only sees the
//! trait, so tests run against an in-memory sink.

use crate::error::{BotError, BotResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a conversation lives: a channel, optionally inside a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub channel: String,
    pub thread: Option<String>,
}

impl ThreadRef {
    pub fn new(channel: impl Into<String>, thread: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            thread,
        }
    }
}

/// Opaque identifier of the one message a relay edits in place.
///
/// Set once after the initial post and never reassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub channel: String,
    pub message_id: String,
}

/// Outbound message operations against the chat platform
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Post a new message into a thread; returns the handle for later edits
    async fn post(&self, thread: &ThreadRef, text: &str) -> BotResult<MessageHandle>;

    /// Replace the full text of an existing message
    async fn update(&self, handle: &MessageHandle, text: &str) -> BotResult<()>;
}

/// HTTP chat sink configuration
#[derive(Debug, Clone)]
pub struct HttpChatSinkConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

/// Chat sink over the platform's JSON web API
pub struct HttpChatSink {
    config: HttpChatSinkConfig,
    client: Client,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread: Option<&'a str>,
    text: &'a str,
}

#[derive(Serialize)]
struct UpdateMessageRequest<'a> {
    channel: &'a str,
    message_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpChatSink {
    /// Create a new HTTP chat sink
    pub fn new(config: HttpChatSinkConfig) -> BotResult<Self> {
        if config.token.is_empty() {
            return Err(BotError::configuration("chat bot token is required"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BotError::configuration(format!("HTTP client build failed: {e}")))?;

        Ok(Self { config, client })
    }

    async fn call(&self, method: &str, body: &impl Serialize) -> BotResult<ApiResponse> {
        let response = self
            .client
            .post(format!("{}/{}", self.config.base_url, method))
            .bearer_auth(&self.config.token)
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::transport(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::transport(format!(
                "{method} returned HTTP {status}"
            )));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| BotError::transport(format!("{method} response unreadable: {e}")))?;

        if !parsed.ok {
            return Err(BotError::transport(format!(
                "{method} rejected: {}",
                parsed.error.as_deref().unwrap_or("unknown error")
            )));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ChatSink for HttpChatSink {
    async fn post(&self, thread: &ThreadRef, text: &str) -> BotResult<MessageHandle> {
        let request = PostMessageRequest {
            channel: &thread.channel,
            thread: thread.thread.as_deref(),
            text,
        };

        let response = self.call("chat.postMessage", &request).await?;
        let message_id = response.message_id.ok_or_else(|| {
            BotError::transport("chat.postMessage succeeded without a message_id")
        })?;

        Ok(MessageHandle {
            channel: thread.channel.clone(),
            message_id,
        })
    }

    async fn update(&self, handle: &MessageHandle, text: &str) -> BotResult<()> {
        let request = UpdateMessageRequest {
            channel: &handle.channel,
            message_id: &handle.message_id,
            text,
        };

        self.call("chat.update", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink_for(server: &MockServer) -> HttpChatSink {
        HttpChatSink::new(HttpChatSinkConfig {
            base_url: server.uri(),
            token: "test-token".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = HttpChatSink::new(HttpChatSinkConfig {
            base_url: "http://localhost".to_string(),
            token: String::new(),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(BotError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_post_returns_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({"channel": "C42", "text": "working..."})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "message_id": "1717171717.0001"})),
            )
            .mount(&server)
            .await;

        let sink = sink_for(&server);
        let thread = ThreadRef::new("C42", Some("1700000000.0000".to_string()));

        let handle = sink.post(&thread, "working...").await.unwrap();
        assert_eq!(handle.channel, "C42");
        assert_eq!(handle.message_id, "1717171717.0001");
    }

    #[tokio::test]
    async fn test_update_edits_in_place() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.update"))
            .and(body_partial_json(
                json!({"channel": "C42", "message_id": "m1", "text": "final"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let sink = sink_for(&server);
        let handle = MessageHandle {
            channel: "C42".to_string(),
            message_id: "m1".to_string(),
        };

        sink.update(&handle, "final").await.unwrap();
    }

    #[tokio::test]
    async fn test_api_level_rejection_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let sink = sink_for(&server);
        let thread = ThreadRef::new("C42", None);

        let result = sink.post(&thread, "hello").await;
        match result {
            Err(BotError::Transport { message }) => {
                assert!(message.contains("channel_not_found"));
            }
            other => panic!("Expected Transport error, got {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_http_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = sink_for(&server);
        let handle = MessageHandle {
            channel: "C42".to_string(),
            message_id: "m1".to_string(),
        };

        let result = sink.update(&handle, "text").await;
        assert!(matches!(result, Err(BotError::Transport { .. })));
    }
}
