//! End-to-end dispatch pipeline tests
//!
//! Exercise the full classify -> resolve -> invoke -> relay chain with the
//! builtin knowledge responders and the in-memory chat sink.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use threadrelay::chat::ThreadRef;
use threadrelay::dispatch::{registry, Dispatcher};
use threadrelay::handlers::builtin::build_handler_store;
use threadrelay::handlers::{AgentEvent, HandlerStore, InvocationContext};
use threadrelay::knowledge::KnowledgeStore;
use threadrelay::relay::{Relay, RelayOptions, RelayOutcome};
use threadrelay::testing::mocks::{MockChatSink, ScriptedHandler, ScriptedReply};
use threadrelay::webhook::{run_pipeline, InboundEvent, WebhookContext};

fn write_file(dir: &Path, name: &str, content: &str) {
    let mut file = std::fs::File::create(dir.join(name)).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

fn knowledge_fixture() -> (tempfile::TempDir, Arc<KnowledgeStore>) {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "startups.json",
        r#"[{"name": "Acme Robotics", "summary": "raised $2M seed"},
            {"name": "Beta Labs", "summary": "ML tooling"}]"#,
    );
    write_file(
        dir.path(),
        "events.json",
        r#"[{"title": "Demo Day", "description": "final pitches at 5pm"}]"#,
    );
    let store = Arc::new(KnowledgeStore::load(dir.path()).unwrap());
    (dir, store)
}

fn fast_options() -> RelayOptions {
    RelayOptions {
        tick_interval: Duration::from_millis(20),
        tool_pause: Duration::from_millis(5),
        final_write_attempts: 3,
        final_write_backoff: Duration::from_millis(5),
    }
}

fn pipeline_context(
    handlers: HandlerStore,
    sink: Arc<MockChatSink>,
) -> Arc<WebhookContext<MockChatSink>> {
    Arc::new(WebhookContext {
        bot_id: "threadrelay-bot".to_string(),
        dispatcher: Dispatcher::new(Arc::new(handlers)),
        relay: Relay::new(sink.clone(), fast_options()),
        sink,
        signing_secret: "unused".to_string(),
        freshness_window_secs: 300,
    })
}

#[tokio::test]
async fn test_startup_question_is_answered_from_knowledge() {
    let (_dir, store) = knowledge_fixture();
    let handlers = build_handler_store(store, None).unwrap();
    registry::validate_bindings(&handlers).unwrap();

    let dispatcher = Dispatcher::new(Arc::new(handlers));
    let sink = Arc::new(MockChatSink::new());
    let relay = Relay::new(sink.clone(), fast_options());

    let ctx = InvocationContext::new("C1", None);
    let outcome = dispatcher
        .dispatch("can you tell me about Acme the startup?", None, &ctx)
        .await
        .unwrap();
    assert_eq!(outcome.display_name, "Startup Analyst");

    let thread = ThreadRef::new("C1", None);
    let relay_outcome = relay.run(&thread, outcome.reply).await;

    assert_eq!(relay_outcome, RelayOutcome::Completed);
    assert_eq!(sink.posts().await.len(), 1);
    let final_text = sink.updates().await.last().unwrap().1.clone();
    assert!(final_text.contains("Acme Robotics"));
    assert!(final_text.contains("$2M"));
}

#[tokio::test]
async fn test_unmatched_question_reaches_general_assistant() {
    let (_dir, store) = knowledge_fixture();
    let handlers = build_handler_store(store, None).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(handlers));

    let ctx = InvocationContext::new("C1", None);
    let outcome = dispatcher
        .dispatch("zzyqx gibberish", None, &ctx)
        .await
        .unwrap();

    assert_eq!(outcome.display_name, "Assistant");
    let text = outcome.reply.collect_text().await.unwrap();
    assert!(text.contains("events, startups"));
}

#[tokio::test]
async fn test_streaming_handler_relays_deltas_into_thread() {
    let mut handlers = HandlerStore::new();
    handlers
        .register(Arc::new(ScriptedHandler::new(
            "events-guide",
            ScriptedReply::Events(vec![
                Ok(AgentEvent::ToolCall {
                    tool_name: "search_kb".to_string(),
                }),
                Ok(AgentEvent::TextDelta {
                    text: "Demo Day ".to_string(),
                }),
                Ok(AgentEvent::TextDelta {
                    text: "is at 5pm.".to_string(),
                }),
            ]),
        )))
        .unwrap();

    let sink = Arc::new(MockChatSink::new());
    let ctx = pipeline_context(handlers, sink.clone());

    run_pipeline(
        ctx,
        InboundEvent {
            text: "when is the workshop event?".to_string(),
            sender: "U1".to_string(),
            channel: "C9".to_string(),
            thread: Some("171.002".to_string()),
        },
    )
    .await;

    let posts = sink.posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, ThreadRef::new("C9", Some("171.002".to_string())));

    let updates = sink.updates().await;
    assert!(updates
        .iter()
        .any(|(_, text)| text.contains("Tool Call: search_kb")));
    assert_eq!(updates.last().unwrap().1, "Demo Day is at 5pm.");
}

#[tokio::test]
async fn test_handler_failure_leaves_error_message_not_silence() {
    let mut handlers = HandlerStore::new();
    handlers
        .register(Arc::new(ScriptedHandler::new(
            "general-assistant",
            ScriptedReply::Fail("responder API unreachable".to_string()),
        )))
        .unwrap();

    let sink = Arc::new(MockChatSink::new());
    let ctx = pipeline_context(handlers, sink.clone());

    run_pipeline(
        ctx,
        InboundEvent {
            text: "anything at all".to_string(),
            sender: "U1".to_string(),
            channel: "C9".to_string(),
            thread: None,
        },
    )
    .await;

    // Dispatch failed before a placeholder existed; the error arrives as a
    // fresh post instead.
    let posts = sink.posts().await;
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("responder API unreachable"));
}

#[tokio::test]
async fn test_mid_stream_failure_replaces_partial_answer() {
    let mut handlers = HandlerStore::new();
    handlers
        .register(Arc::new(ScriptedHandler::new(
            "general-assistant",
            ScriptedReply::Events(vec![
                Ok(AgentEvent::TextDelta {
                    text: "partial ".to_string(),
                }),
                Err("model crashed".to_string()),
            ]),
        )))
        .unwrap();

    let sink = Arc::new(MockChatSink::new());
    let ctx = pipeline_context(handlers, sink.clone());

    run_pipeline(
        ctx,
        InboundEvent {
            text: "unmatched question".to_string(),
            sender: "U1".to_string(),
            channel: "C9".to_string(),
            thread: None,
        },
    )
    .await;

    let final_text = sink.updates().await.last().unwrap().1.clone();
    assert!(final_text.contains("model crashed"));
    assert!(!final_text.contains("partial"));
}

#[tokio::test]
async fn test_enrichment_reaches_the_handler() {
    let handler = Arc::new(ScriptedHandler::new(
        "general-assistant",
        ScriptedReply::Text("ok".to_string()),
    ));
    let mut handlers = HandlerStore::new();
    handlers.register(handler.clone()).unwrap();

    let dispatcher = Dispatcher::new(Arc::new(handlers));
    let ctx = InvocationContext::new("C1", None);

    dispatcher
        .dispatch(
            "and the first two",
            Some("Previous answer listed: Acme, Beta, Gamma."),
            &ctx,
        )
        .await
        .unwrap();

    let invocations = handler.invocations().await;
    assert_eq!(invocations.len(), 1);
    assert!(invocations[0].starts_with("Previous answer listed: Acme, Beta, Gamma."));
    assert!(invocations[0].ends_with("and the first two?"));
}
