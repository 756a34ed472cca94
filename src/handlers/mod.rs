//! Responder handlers
//!
//! A handler answers one category of question. It returns either a single
//! final text or a stream of progress events that the Relay mirrors into the
//! chat message. The `HandlerStore` is the one registry of live handler
//! instances, built at startup and passed into the dispatcher by reference --
//! handlers never look each other up by name at runtime.

use crate::error::{BotError, BotResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub mod builtin;
pub mod events;
pub mod remote;

pub use events::{AgentEvent, ToolOutputPayload};
pub use remote::{RemoteAgentConfig, RemoteAgentHandler};

/// Buffered channel size for responder event streams
pub const EVENT_STREAM_BUFFER: usize = 32;

/// An asynchronous sequence of responder progress events.
///
/// The sequence is finite but of unbounded length; an `Err` item ends it.
pub type EventStream = mpsc::Receiver<BotResult<AgentEvent>>;

/// Correlation identifiers carried into a handler invocation
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub correlation_id: Uuid,
    pub channel: String,
    pub thread: Option<String>,
}

impl InvocationContext {
    pub fn new(channel: impl Into<String>, thread: Option<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            channel: channel.into(),
            thread,
        }
    }
}

/// What a handler produced for a query
pub enum HandlerReply {
    /// A single final answer
    Text(String),
    /// An incremental event stream ending in the full answer
    Stream(EventStream),
}

impl HandlerReply {
    /// Drain this reply to its final text, for callers that do not relay
    /// progress (CLI, tests). Stream errors surface as handler errors.
    pub async fn collect_text(self) -> BotResult<String> {
        match self {
            HandlerReply::Text(text) => Ok(text),
            HandlerReply::Stream(mut events) => {
                let mut text = String::new();
                while let Some(item) = events.recv().await {
                    if let AgentEvent::TextDelta { text: delta } = item? {
                        text.push_str(&delta);
                    }
                }
                Ok(text)
            }
        }
    }
}

/// A specialized responder for one category of question
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Stable handler identifier used by the dispatch table
    fn id(&self) -> &str;

    /// Answer a query, either directly or as a progress stream
    async fn invoke(&self, query: &str, ctx: &InvocationContext) -> BotResult<HandlerReply>;
}

/// Registry of live handler instances, keyed by handler ID.
///
/// Read-only after startup; shared across concurrent pipelines by `Arc`.
#[derive(Default)]
pub struct HandlerStore {
    handlers: HashMap<String, Arc<dyn AgentHandler>>,
}

impl HandlerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own ID. Registering the same ID twice is
    /// a wiring bug, caught here instead of at request time.
    pub fn register(&mut self, handler: Arc<dyn AgentHandler>) -> BotResult<()> {
        let id = handler.id().to_string();
        if self.handlers.contains_key(&id) {
            return Err(BotError::configuration(format!(
                "handler '{id}' registered twice"
            )));
        }
        self.handlers.insert(id, handler);
        Ok(())
    }

    pub fn get(&self, handler_id: &str) -> Option<Arc<dyn AgentHandler>> {
        self.handlers.get(handler_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
