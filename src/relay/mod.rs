//! Incremental response relay
//!
//! Mirrors a responder's progress into one chat message edited in place.
//! The relay posts a placeholder, runs a periodic animation tick, consumes
//! the responder's event stream in arrival order, and finishes with exactly
//! one terminal write sequence -- on success, failure, or an empty stream.
//!
//! The tick task and the consumption loop share one `RelayState` behind a
//! mutex and one atomic `finished` flag. The flag is checked at the top of
//! every tick and set before the terminal write begins, so the timer is
//! stopped before the final text goes out; a tick already past the check may
//! interleave, and the terminal write supersedes it as the last full-text
//! replacement.

use crate::chat::{ChatSink, MessageHandle, ThreadRef};
use crate::config::RelaySection;
use crate::error::BotError;
use crate::handlers::{AgentEvent, HandlerReply};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

pub mod status;

pub use status::render_status;

/// Terminal text when a responder produced no output at all
pub const NO_ANSWER_FALLBACK: &str = "no answer produced";

/// Mutable state of one in-flight relay.
///
/// Single-owner in spirit: only the owning relay's tick task and consumption
/// loop ever touch it, never other relays.
#[derive(Debug, Clone)]
pub struct RelayState {
    pub accumulated_text: String,
    pub current_event_kind: String,
    pub active_tool_name: Option<String>,
    pub active_workflow_name: Option<String>,
    pub active_step_name: Option<String>,
    pub active_agent_name: Option<String>,
}

impl RelayState {
    pub fn new() -> Self {
        Self {
            accumulated_text: String::new(),
            current_event_kind: "starting".to_string(),
            active_tool_name: None,
            active_workflow_name: None,
            active_step_name: None,
            active_agent_name: None,
        }
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay timing and retry policy
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Animation tick interval
    pub tick_interval: Duration,
    /// Pause after tool/step starts so short tool runs stay visible
    pub tool_pause: Duration,
    /// Terminal write attempts (at least 1)
    pub final_write_attempts: u32,
    /// Fixed backoff between terminal write attempts
    pub final_write_backoff: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(300),
            tool_pause: Duration::from_millis(350),
            final_write_attempts: 3,
            final_write_backoff: Duration::from_millis(500),
        }
    }
}

impl From<&RelaySection> for RelayOptions {
    fn from(section: &RelaySection) -> Self {
        Self {
            tick_interval: Duration::from_millis(section.tick_interval_ms),
            tool_pause: Duration::from_millis(section.tool_pause_ms),
            final_write_attempts: section.final_write_attempts.max(1),
            final_write_backoff: Duration::from_millis(section.final_write_backoff_ms),
        }
    }
}

/// How a relay run ended, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Stream drained; the answer (or the fallback) was written
    Completed,
    /// Stream or placeholder failed; an error message was written instead
    Failed,
}

/// Relays one responder reply at a time into the chat
pub struct Relay<S: ChatSink> {
    sink: Arc<S>,
    options: RelayOptions,
}

impl<S: ChatSink + 'static> Relay<S> {
    pub fn new(sink: Arc<S>, options: RelayOptions) -> Self {
        Self { sink, options }
    }

    /// Run one relay to completion.
    ///
    /// The returned outcome is informational; all user-visible effects go
    /// through the chat sink, and the relay never propagates handler or
    /// transport failures to its caller.
    pub async fn run(&self, thread: &ThreadRef, reply: HandlerReply) -> RelayOutcome {
        let state = Arc::new(Mutex::new(RelayState::new()));
        let finished = Arc::new(AtomicBool::new(false));

        // Starting: one placeholder post establishes the handle every later
        // update edits. Without the handle there is nothing to animate, so a
        // failed post short-circuits into a fresh error message.
        let placeholder = {
            let initial = state.lock().await;
            render_status(&initial, 0)
        };
        let handle = match self.sink.post(thread, &placeholder).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Placeholder post failed; relay cannot start");
                let message = BotError::transport("could not start answering").user_message();
                if let Err(post_error) = self.sink.post(thread, &message).await {
                    error!(error = %post_error, "Error message post failed too");
                }
                return RelayOutcome::Failed;
            }
        };

        let tick_task = self.spawn_tick_task(state.clone(), finished.clone(), handle.clone());

        // Streaming: events are processed strictly in arrival order.
        let stream_result = match reply {
            HandlerReply::Text(text) => {
                state.lock().await.accumulated_text = text;
                Ok(())
            }
            HandlerReply::Stream(mut events) => {
                let mut failure = None;
                while let Some(item) = events.recv().await {
                    match item {
                        Ok(event) => self.apply_event(&state, &handle, event).await,
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                match failure {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
        };

        // Finalizing/Failed: stop the timer before the terminal write. Ticks
        // check the flag at the top, so none starts after this point.
        finished.store(true, Ordering::SeqCst);

        let (final_text, outcome) = match &stream_result {
            Ok(()) => {
                let s = state.lock().await;
                let text = if s.accumulated_text.is_empty() {
                    NO_ANSWER_FALLBACK.to_string()
                } else {
                    s.accumulated_text.clone()
                };
                (text, RelayOutcome::Completed)
            }
            Err(e) => {
                warn!(error = %e, "Responder stream failed; relaying error to thread");
                (e.user_message(), RelayOutcome::Failed)
            }
        };

        self.write_terminal(&handle, &final_text).await;
        tick_task.abort();

        outcome
    }

    fn spawn_tick_task(
        &self,
        state: Arc<Mutex<RelayState>>,
        finished: Arc<AtomicBool>,
        handle: MessageHandle,
    ) -> tokio::task::JoinHandle<()> {
        let sink = self.sink.clone();
        let tick_interval = self.options.tick_interval;

        tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            // The first interval tick fires immediately; the placeholder
            // already shows frame 0, so consume it.
            ticker.tick().await;

            let mut frame: u64 = 0;
            loop {
                ticker.tick().await;
                if finished.load(Ordering::SeqCst) {
                    break;
                }

                frame = frame.wrapping_add(1);
                let rendered = {
                    let s = state.lock().await;
                    render_status(&s, frame)
                };

                // Fire-and-forget: a dropped animation frame is cosmetic.
                if let Err(e) = sink.update(&handle, &rendered).await {
                    debug!(error = %e, "Animation tick update failed; ignoring");
                }
            }
        })
    }

    /// Apply one stream event to the relay state, with the extra immediate
    /// render (plus anti-flicker pause) for tool and workflow-step starts.
    async fn apply_event(
        &self,
        state: &Arc<Mutex<RelayState>>,
        handle: &MessageHandle,
        event: AgentEvent,
    ) {
        let mut announce = false;
        {
            let mut s = state.lock().await;
            s.current_event_kind = event.kind().to_string();

            match event {
                AgentEvent::TextDelta { text } => {
                    s.accumulated_text.push_str(&text);
                }
                AgentEvent::ToolCall { tool_name } => {
                    s.active_tool_name = Some(tool_name);
                    announce = true;
                }
                AgentEvent::ToolOutput { payload } => {
                    if let Some(step_name) = payload.workflow_step() {
                        s.current_event_kind = "workflow_step_started".to_string();
                        s.active_step_name = Some(step_name.to_string());
                        announce = true;
                    }
                }
                AgentEvent::WorkflowStarted { workflow_name } => {
                    s.active_workflow_name = Some(workflow_name);
                }
                AgentEvent::AgentStarted { agent_name } => {
                    s.active_agent_name = Some(agent_name);
                }
                AgentEvent::Other { .. } => {}
            }
        }

        if announce {
            let rendered = {
                let s = state.lock().await;
                render_status(&s, 0)
            };
            if let Err(e) = self.sink.update(handle, &rendered).await {
                debug!(error = %e, "Event announcement update failed; ignoring");
            }
            // Keep the announcement on screen even when the tool finishes
            // within one tick.
            sleep(self.options.tool_pause).await;
        }
    }

    /// The one terminal write sequence: bounded attempts, fixed backoff,
    /// stop on first success. Exhaustion is logged and tolerated -- an
    /// unreachable chat sink is outside this subsystem's control.
    async fn write_terminal(&self, handle: &MessageHandle, text: &str) {
        let attempts = self.options.final_write_attempts;
        for attempt in 1..=attempts {
            match self.sink.update(handle, text).await {
                Ok(()) => {
                    info!(attempt, "Terminal message written");
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Terminal write attempt failed");
                    if attempt < attempts {
                        sleep(self.options.final_write_backoff).await;
                    }
                }
            }
        }
        error!(attempts, "Terminal write exhausted all attempts; giving up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ToolOutputPayload;
    use crate::testing::mocks::{event_stream, MockChatSink};

    fn thread() -> ThreadRef {
        ThreadRef::new("C1", Some("171.001".to_string()))
    }

    fn fast_options() -> RelayOptions {
        RelayOptions {
            tick_interval: Duration::from_millis(20),
            tool_pause: Duration::from_millis(5),
            final_write_attempts: 3,
            final_write_backoff: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_text_reply_relays_directly() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        let outcome = relay
            .run(&thread(), HandlerReply::Text("the answer".to_string()))
            .await;

        assert_eq!(outcome, RelayOutcome::Completed);
        assert_eq!(sink.posts().await.len(), 1);
        let updates = sink.updates().await;
        assert_eq!(updates.last().unwrap().1, "the answer");
    }

    #[tokio::test]
    async fn test_deltas_accumulate_into_final_text() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        let events = event_stream(vec![
            Ok(AgentEvent::TextDelta {
                text: "a".to_string(),
            }),
            Ok(AgentEvent::TextDelta {
                text: "b".to_string(),
            }),
        ]);

        let outcome = relay.run(&thread(), HandlerReply::Stream(events)).await;

        assert_eq!(outcome, RelayOutcome::Completed);
        assert_eq!(sink.updates().await.last().unwrap().1, "ab");
    }

    #[tokio::test]
    async fn test_empty_stream_writes_fallback() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        let outcome = relay
            .run(&thread(), HandlerReply::Stream(event_stream(vec![])))
            .await;

        assert_eq!(outcome, RelayOutcome::Completed);
        assert_eq!(sink.updates().await.last().unwrap().1, NO_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn test_tool_call_announces_immediately() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        let events = event_stream(vec![
            Ok(AgentEvent::ToolCall {
                tool_name: "search_kb".to_string(),
            }),
            Ok(AgentEvent::TextDelta {
                text: "done".to_string(),
            }),
        ]);

        relay.run(&thread(), HandlerReply::Stream(events)).await;

        let updates = sink.updates().await;
        assert!(
            updates
                .iter()
                .any(|(_, text)| text.contains("Tool Call: search_kb")),
            "expected a tool announcement among {updates:?}"
        );
    }

    #[tokio::test]
    async fn test_nested_workflow_step_announces() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        let events = event_stream(vec![Ok(AgentEvent::ToolOutput {
            payload: ToolOutputPayload::WorkflowStepStarted {
                step_name: "rank results".to_string(),
            },
        })]);

        relay.run(&thread(), HandlerReply::Stream(events)).await;

        let updates = sink.updates().await;
        assert!(updates
            .iter()
            .any(|(_, text)| text.contains("Workflow Step Started: rank results")));
    }

    #[tokio::test]
    async fn test_stream_error_writes_error_not_partial_text() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        let events = event_stream(vec![
            Ok(AgentEvent::TextDelta {
                text: "a".to_string(),
            }),
            Ok(AgentEvent::TextDelta {
                text: "b".to_string(),
            }),
            Err(BotError::handler_execution("model crashed")),
        ]);

        let outcome = relay.run(&thread(), HandlerReply::Stream(events)).await;

        assert_eq!(outcome, RelayOutcome::Failed);
        let last = sink.updates().await.last().unwrap().1.clone();
        assert_ne!(last, "ab");
        assert!(last.contains("model crashed"));
    }

    #[tokio::test]
    async fn test_no_ticks_after_terminal_write() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        relay
            .run(&thread(), HandlerReply::Text("final".to_string()))
            .await;

        let settled = sink.updates().await.len();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.updates().await.len(), settled, "timer kept ticking");
        assert_eq!(sink.updates().await.last().unwrap().1, "final");
    }

    #[tokio::test]
    async fn test_terminal_write_retries_then_succeeds() {
        let sink = Arc::new(MockChatSink::failing_first_updates(2));
        let options = RelayOptions {
            // Long ticks so only the terminal sequence reaches the sink.
            tick_interval: Duration::from_secs(30),
            ..fast_options()
        };
        let relay = Relay::new(sink.clone(), options);

        let outcome = relay
            .run(&thread(), HandlerReply::Text("persistent".to_string()))
            .await;

        assert_eq!(outcome, RelayOutcome::Completed);
        assert_eq!(sink.update_attempts(), 3, "expected exactly 3 attempts");
        assert_eq!(sink.updates().await.last().unwrap().1, "persistent");
    }

    #[tokio::test]
    async fn test_terminal_write_exhaustion_is_tolerated() {
        let sink = Arc::new(MockChatSink::failing_first_updates(100));
        let options = RelayOptions {
            tick_interval: Duration::from_secs(30),
            ..fast_options()
        };
        let relay = Relay::new(sink.clone(), options);

        let outcome = relay
            .run(&thread(), HandlerReply::Text("lost".to_string()))
            .await;

        // The relay neither panics nor retries beyond the bound.
        assert_eq!(outcome, RelayOutcome::Completed);
        assert_eq!(sink.update_attempts(), 3);
    }

    #[tokio::test]
    async fn test_placeholder_failure_posts_fresh_error() {
        let sink = Arc::new(MockChatSink::failing_first_posts(1));
        let relay = Relay::new(sink.clone(), fast_options());

        let outcome = relay
            .run(&thread(), HandlerReply::Text("unused".to_string()))
            .await;

        assert_eq!(outcome, RelayOutcome::Failed);
        // No handle existed, so nothing was updated; a fresh message carries
        // the error instead.
        assert!(sink.updates().await.is_empty());
        let posts = sink.posts().await;
        assert_eq!(posts.len(), 2);
        assert!(posts.last().unwrap().1.contains("could not start"));
    }

    #[tokio::test]
    async fn test_exactly_one_placeholder_post() {
        let sink = Arc::new(MockChatSink::new());
        let relay = Relay::new(sink.clone(), fast_options());

        let events = event_stream(vec![
            Ok(AgentEvent::ToolCall {
                tool_name: "lookup".to_string(),
            }),
            Ok(AgentEvent::TextDelta {
                text: "x".to_string(),
            }),
        ]);
        relay.run(&thread(), HandlerReply::Stream(events)).await;

        assert_eq!(sink.posts().await.len(), 1);
    }
}
