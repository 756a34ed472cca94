//! Mock implementations for testing
//!
//! Provides an in-memory chat sink with scripted failures and scripted
//! responder handlers, so dispatch and relay behavior is testable without a
//! chat platform or responder API.

use crate::chat::{ChatSink, MessageHandle, ThreadRef};
use crate::error::{BotError, BotResult};
use crate::handlers::{
    AgentEvent, AgentHandler, EventStream, HandlerReply, InvocationContext, EVENT_STREAM_BUFFER,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// In-memory chat sink recording every call.
///
/// `posts` and `updates` keep the text of each attempted post and each
/// successful update; `update_attempts` counts update calls including the
/// ones scripted to fail.
#[derive(Default)]
pub struct MockChatSink {
    posts: Arc<Mutex<Vec<(ThreadRef, String)>>>,
    updates: Arc<Mutex<Vec<(MessageHandle, String)>>>,
    update_attempts: AtomicU32,
    fail_posts_remaining: AtomicU32,
    fail_updates_remaining: AtomicU32,
    next_message_id: AtomicU32,
}

impl MockChatSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` post calls with a transport error
    pub fn failing_first_posts(n: u32) -> Self {
        let sink = Self::default();
        sink.fail_posts_remaining.store(n, Ordering::SeqCst);
        sink
    }

    /// Fail the first `n` update calls with a transport error
    pub fn failing_first_updates(n: u32) -> Self {
        let sink = Self::default();
        sink.fail_updates_remaining.store(n, Ordering::SeqCst);
        sink
    }

    /// Every post attempt, in call order
    pub async fn posts(&self) -> Vec<(ThreadRef, String)> {
        self.posts.lock().await.clone()
    }

    /// Every successful update, in call order
    pub async fn updates(&self) -> Vec<(MessageHandle, String)> {
        self.updates.lock().await.clone()
    }

    /// Total update calls, successful or not
    pub fn update_attempts(&self) -> u32 {
        self.update_attempts.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ChatSink for MockChatSink {
    async fn post(&self, thread: &ThreadRef, text: &str) -> BotResult<MessageHandle> {
        self.posts
            .lock()
            .await
            .push((thread.clone(), text.to_string()));

        if Self::take_failure(&self.fail_posts_remaining) {
            return Err(BotError::transport("mock post failure"));
        }

        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageHandle {
            channel: thread.channel.clone(),
            message_id: format!("msg-{id}"),
        })
    }

    async fn update(&self, handle: &MessageHandle, text: &str) -> BotResult<()> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.fail_updates_remaining) {
            return Err(BotError::transport("mock update failure"));
        }

        self.updates
            .lock()
            .await
            .push((handle.clone(), text.to_string()));
        Ok(())
    }
}

/// Build an event stream from a fixed script. Items are forwarded in order;
/// the channel closes when the script is exhausted.
pub fn event_stream(items: Vec<BotResult<AgentEvent>>) -> EventStream {
    let (tx, rx) = mpsc::channel(EVENT_STREAM_BUFFER.max(items.len() + 1));
    tokio::spawn(async move {
        for item in items {
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// What a scripted handler replies with. Errors are kept as strings so the
/// script stays cloneable across invocations.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Events(Vec<Result<AgentEvent, String>>),
    Fail(String),
}

/// Responder handler driven by a fixed script
pub struct ScriptedHandler {
    id: String,
    reply: ScriptedReply,
    invocations: Arc<Mutex<Vec<String>>>,
}

impl ScriptedHandler {
    pub fn new(id: impl Into<String>, reply: ScriptedReply) -> Self {
        Self {
            id: id.into(),
            reply,
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queries this handler has been invoked with
    pub async fn invocations(&self) -> Vec<String> {
        self.invocations.lock().await.clone()
    }
}

#[async_trait]
impl AgentHandler for ScriptedHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, query: &str, _ctx: &InvocationContext) -> BotResult<HandlerReply> {
        self.invocations.lock().await.push(query.to_string());

        match &self.reply {
            ScriptedReply::Text(text) => Ok(HandlerReply::Text(text.clone())),
            ScriptedReply::Events(items) => {
                let items = items
                    .iter()
                    .map(|item| match item {
                        Ok(event) => Ok(event.clone()),
                        Err(message) => Err(BotError::handler_execution(message.clone())),
                    })
                    .collect();
                Ok(HandlerReply::Stream(event_stream(items)))
            }
            ScriptedReply::Fail(message) => Err(BotError::handler_execution(message.clone())),
        }
    }
}
