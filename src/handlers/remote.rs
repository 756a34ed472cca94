//! Remote responder API integration
//!
//! Invokes a responder hosted by the agent service and adapts its
//! newline-delimited JSON event stream into the crate's `EventStream`. The
//! HTTP reader runs in a background task and forwards decoded events over a
//! bounded channel; dropping the receiver ends the forwarder.

use crate::error::{BotError, BotResult};
use crate::handlers::events::AgentEvent;
use crate::handlers::{AgentHandler, HandlerReply, InvocationContext, EVENT_STREAM_BUFFER};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Remote responder API configuration
#[derive(Debug, Clone)]
pub struct RemoteAgentConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for RemoteAgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8700/v1".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Handler backed by the remote agent service
pub struct RemoteAgentHandler {
    id: String,
    config: RemoteAgentConfig,
    client: Client,
}

#[derive(Serialize)]
struct InvocationRequest<'a> {
    query: &'a str,
    correlation_id: String,
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread: Option<&'a str>,
}

impl RemoteAgentHandler {
    /// Create a new remote handler
    pub fn new(id: impl Into<String>, config: RemoteAgentConfig) -> BotResult<Self> {
        if config.api_key.is_empty() {
            return Err(BotError::configuration(
                "remote responder API key is required",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BotError::configuration(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            id: id.into(),
            config,
            client,
        })
    }

    /// Forward decoded NDJSON lines from the response body into the channel.
    async fn forward_events(
        response: reqwest::Response,
        tx: mpsc::Sender<BotResult<AgentEvent>>,
    ) {
        let mut body = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tx
                        .send(Err(BotError::handler_execution(format!(
                            "event stream read failed: {e}"
                        ))))
                        .await;
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);
            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                if !Self::send_line(&line, &tx).await {
                    return;
                }
            }
        }

        // Stream ended without a trailing newline on the last event.
        let rest = std::mem::take(&mut buffer);
        Self::send_line(&rest, &tx).await;
    }

    /// Decode one line and push it downstream. Returns false once the
    /// receiver is gone and forwarding should stop.
    async fn send_line(line: &[u8], tx: &mpsc::Sender<BotResult<AgentEvent>>) -> bool {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return true;
        }

        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => {
                let event = AgentEvent::decode(&value);
                tx.send(Ok(event)).await.is_ok()
            }
            Err(e) => {
                // One garbled line is dropped, not fatal to the stream.
                debug!(error = %e, "Skipping undecodable event line");
                true
            }
        }
    }
}

#[async_trait]
impl AgentHandler for RemoteAgentHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, query: &str, ctx: &InvocationContext) -> BotResult<HandlerReply> {
        let request = InvocationRequest {
            query,
            correlation_id: ctx.correlation_id.to_string(),
            channel: &ctx.channel,
            thread: ctx.thread.as_deref(),
        };

        let response = self
            .client
            .post(format!(
                "{}/responders/{}/invocations",
                self.config.base_url, self.id
            ))
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/x-ndjson")
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::handler_execution(format!("responder API unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(
                handler_id = %self.id,
                status = %status,
                "Responder API rejected invocation"
            );
            return Err(BotError::handler_execution(format!(
                "responder API error: {status} - {error_text}"
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_STREAM_BUFFER);
        tokio::spawn(Self::forward_events(response, tx));

        Ok(HandlerReply::Stream(rx))
    }
}
