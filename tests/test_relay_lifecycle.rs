//! Relay lifecycle tests
//!
//! Drive the relay against slow, scripted event streams and verify the
//! lifecycle guarantees: one placeholder, animated progress while the
//! responder works, and one terminal write after the timer has stopped.

use std::sync::Arc;
use std::time::Duration;
use threadrelay::chat::ThreadRef;
use threadrelay::handlers::{AgentEvent, HandlerReply, EVENT_STREAM_BUFFER};
use threadrelay::relay::{Relay, RelayOptions, RelayOutcome, NO_ANSWER_FALLBACK};
use threadrelay::testing::mocks::MockChatSink;
use threadrelay::BotResult;
use tokio::sync::mpsc;
use tokio::time::sleep;

fn thread() -> ThreadRef {
    ThreadRef::new("C1", Some("171.001".to_string()))
}

fn options() -> RelayOptions {
    RelayOptions {
        tick_interval: Duration::from_millis(20),
        tool_pause: Duration::from_millis(5),
        final_write_attempts: 3,
        final_write_backoff: Duration::from_millis(5),
    }
}

/// Stream that delivers each event after a delay, so the relay's timer gets
/// to tick between events like it would against a real responder.
fn slow_stream(
    items: Vec<BotResult<AgentEvent>>,
    gap: Duration,
) -> mpsc::Receiver<BotResult<AgentEvent>> {
    let (tx, rx) = mpsc::channel(EVENT_STREAM_BUFFER);
    tokio::spawn(async move {
        for item in items {
            sleep(gap).await;
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    rx
}

fn delta(text: &str) -> BotResult<AgentEvent> {
    Ok(AgentEvent::TextDelta {
        text: text.to_string(),
    })
}

#[tokio::test]
async fn test_progress_animates_while_responder_works() {
    let sink = Arc::new(MockChatSink::new());
    let relay = Relay::new(sink.clone(), options());

    let events = slow_stream(
        vec![delta("a"), delta("b")],
        Duration::from_millis(90),
    );
    let outcome = relay.run(&thread(), HandlerReply::Stream(events)).await;

    assert_eq!(outcome, RelayOutcome::Completed);
    assert_eq!(sink.posts().await.len(), 1, "exactly one placeholder post");

    let updates = sink.updates().await;
    // With ~180ms of stream time and a 20ms tick, several animation frames
    // must have landed before the answer.
    let tick_updates = updates
        .iter()
        .filter(|(_, text)| text.contains("Starting"))
        .count();
    assert!(
        tick_updates >= 2,
        "expected animated progress updates, saw {updates:?}"
    );
    assert_eq!(updates.last().unwrap().1, "ab");
}

#[tokio::test]
async fn test_terminal_write_happens_after_timer_stops() {
    let sink = Arc::new(MockChatSink::new());
    let relay = Relay::new(sink.clone(), options());

    let events = slow_stream(vec![delta("answer")], Duration::from_millis(60));
    relay.run(&thread(), HandlerReply::Stream(events)).await;

    // The final value is the last update...
    let settled = sink.updates().await;
    assert_eq!(settled.last().unwrap().1, "answer");

    // ...and stays the last update: no tick fires after the terminal write.
    sleep(Duration::from_millis(120)).await;
    let later = sink.updates().await;
    assert_eq!(later.len(), settled.len());
    assert_eq!(later.last().unwrap().1, "answer");
}

#[tokio::test]
async fn test_empty_stream_resolves_to_fallback_text() {
    let sink = Arc::new(MockChatSink::new());
    let relay = Relay::new(sink.clone(), options());

    let events = slow_stream(vec![], Duration::from_millis(1));
    let outcome = relay.run(&thread(), HandlerReply::Stream(events)).await;

    assert_eq!(outcome, RelayOutcome::Completed);
    assert_eq!(sink.updates().await.last().unwrap().1, NO_ANSWER_FALLBACK);
}

#[tokio::test]
async fn test_error_after_deltas_stops_ticks_and_reports() {
    let sink = Arc::new(MockChatSink::new());
    let relay = Relay::new(sink.clone(), options());

    let events = slow_stream(
        vec![
            delta("a"),
            delta("b"),
            Err(threadrelay::BotError::handler_execution("upstream died")),
        ],
        Duration::from_millis(30),
    );
    let outcome = relay.run(&thread(), HandlerReply::Stream(events)).await;

    assert_eq!(outcome, RelayOutcome::Failed);

    let settled = sink.updates().await;
    let last = settled.last().unwrap().1.clone();
    assert!(last.contains("upstream died"));
    assert_ne!(last, "ab");

    sleep(Duration::from_millis(120)).await;
    assert_eq!(
        sink.updates().await.len(),
        settled.len(),
        "ticks continued after the error was handled"
    );
}

#[tokio::test]
async fn test_terminal_retry_succeeds_within_bound() {
    let sink = Arc::new(MockChatSink::failing_first_updates(2));
    let relay = Relay::new(
        sink.clone(),
        RelayOptions {
            // Ticks parked out of the way; only the terminal sequence calls
            // update.
            tick_interval: Duration::from_secs(60),
            ..options()
        },
    );

    let events = slow_stream(vec![delta("kept")], Duration::from_millis(5));
    let outcome = relay.run(&thread(), HandlerReply::Stream(events)).await;

    assert_eq!(outcome, RelayOutcome::Completed);
    assert_eq!(
        sink.update_attempts(),
        3,
        "two failures, one success, no fourth attempt"
    );
    assert_eq!(sink.updates().await.last().unwrap().1, "kept");
}

#[tokio::test]
async fn test_concurrent_relays_do_not_share_state() {
    let sink = Arc::new(MockChatSink::new());
    let relay_a = Relay::new(sink.clone(), options());
    let relay_b = Relay::new(sink.clone(), options());

    let thread_a = ThreadRef::new("CA", None);
    let thread_b = ThreadRef::new("CB", None);

    let (a, b) = tokio::join!(
        relay_a.run(
            &thread_a,
            HandlerReply::Stream(slow_stream(
                vec![delta("answer A")],
                Duration::from_millis(40)
            ))
        ),
        relay_b.run(
            &thread_b,
            HandlerReply::Stream(slow_stream(
                vec![delta("answer B")],
                Duration::from_millis(55)
            ))
        ),
    );

    assert_eq!(a, RelayOutcome::Completed);
    assert_eq!(b, RelayOutcome::Completed);

    let updates = sink.updates().await;
    let final_a = updates
        .iter()
        .rev()
        .find(|(handle, _)| handle.channel == "CA")
        .unwrap();
    let final_b = updates
        .iter()
        .rev()
        .find(|(handle, _)| handle.channel == "CB")
        .unwrap();
    assert_eq!(final_a.1, "answer A");
    assert_eq!(final_b.1, "answer B");
}
