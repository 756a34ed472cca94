//! Inbound webhook server
//!
//! Receives message deliveries from the chat platform, verifies the HMAC
//! signature and timestamp freshness before anything else runs, then spawns
//! one dispatch-and-relay pipeline per verified message. Also serves the
//! liveness endpoint for container orchestration.

use crate::chat::{ChatSink, ThreadRef};
use crate::dispatch::Dispatcher;
use crate::error::{BotError, BotResult};
use crate::handlers::InvocationContext;
use crate::relay::Relay;
use crate::webhook::signature::{timestamp_is_fresh, verify_signature};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::Filter;

pub mod signature;

/// One message delivery from the chat platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub text: String,
    pub sender: String,
    pub channel: String,
    #[serde(default)]
    pub thread: Option<String>,
}

#[derive(Serialize)]
struct AckResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Everything one pipeline run needs, shared across requests
pub struct WebhookContext<S: ChatSink> {
    pub bot_id: String,
    pub dispatcher: Dispatcher,
    pub relay: Relay<S>,
    pub sink: Arc<S>,
    pub signing_secret: String,
    pub freshness_window_secs: u64,
}

impl<S: ChatSink + 'static> WebhookContext<S> {
    /// Verify a delivery's signature headers against the raw body.
    fn authorize(&self, timestamp: &str, provided: &str, body: &[u8]) -> BotResult<()> {
        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| BotError::auth("timestamp header is not a number"))?;

        let now = chrono::Utc::now().timestamp();
        if !timestamp_is_fresh(timestamp, now, self.freshness_window_secs) {
            return Err(BotError::auth("request timestamp outside freshness window"));
        }

        if !verify_signature(&self.signing_secret, timestamp, body, provided) {
            return Err(BotError::auth("signature mismatch"));
        }

        Ok(())
    }
}

/// Serve the webhook until the shutdown future resolves.
pub async fn serve<S: ChatSink + 'static>(
    ctx: Arc<WebhookContext<S>>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) {
    let (bound, server) =
        warp::serve(routes(ctx)).bind_with_graceful_shutdown(addr, shutdown);
    info!(addr = %bound, "Webhook server listening");
    server.await;
}

/// The warp route tree: POST /webhook/event and GET /health.
pub fn routes<S: ChatSink + 'static>(
    ctx: Arc<WebhookContext<S>>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let event_ctx = ctx.clone();
    let event_route = warp::path!("webhook" / "event")
        .and(warp::post())
        .and(warp::header::<String>("x-request-timestamp"))
        .and(warp::header::<String>("x-signature"))
        .and(warp::body::bytes())
        .and_then(move |timestamp: String, signature: String, body: Bytes| {
            let ctx = event_ctx.clone();
            async move { handle_event(ctx, timestamp, signature, body).await }
        });

    let health_ctx = ctx.clone();
    let health_route = warp::path("health").and(warp::get()).map(move || {
        warp::reply::json(&serde_json::json!({
            "status": "ok",
            "bot_id": health_ctx.bot_id,
        }))
    });

    event_route.or(health_route)
}

async fn handle_event<S: ChatSink + 'static>(
    ctx: Arc<WebhookContext<S>>,
    timestamp: String,
    signature: String,
    body: Bytes,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    if let Err(e) = ctx.authorize(&timestamp, &signature, &body) {
        warn!(error = %e, "Rejected webhook delivery");
        return Ok(reply(StatusCode::UNAUTHORIZED, Some(e.to_string())));
    }

    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook delivery body unreadable");
            return Ok(reply(
                StatusCode::BAD_REQUEST,
                Some(format!("invalid event body: {e}")),
            ));
        }
    };

    // The bot's own relayed messages echo back through the webhook.
    if event.sender == ctx.bot_id {
        return Ok(reply(StatusCode::OK, None));
    }

    // Acknowledge immediately; the pipeline runs in its own task so slow
    // responders never trip the platform's delivery timeout.
    tokio::spawn(run_pipeline(ctx, event));

    Ok(reply(StatusCode::OK, None))
}

fn reply(
    status: StatusCode,
    error: Option<String>,
) -> warp::reply::WithStatus<warp::reply::Json> {
    let body = AckResponse {
        ok: status == StatusCode::OK,
        error,
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

/// One full pipeline: dispatch the question, relay the reply into the thread.
pub async fn run_pipeline<S: ChatSink + 'static>(ctx: Arc<WebhookContext<S>>, event: InboundEvent) {
    let thread = ThreadRef::new(event.channel.clone(), event.thread.clone());
    let invocation = InvocationContext::new(event.channel.clone(), event.thread.clone());

    info!(
        correlation_id = %invocation.correlation_id,
        channel = %event.channel,
        sender = %event.sender,
        "Handling inbound question"
    );

    match ctx.dispatcher.dispatch(&event.text, None, &invocation).await {
        Ok(outcome) => {
            let responder = outcome.display_name;
            let relay_outcome = ctx.relay.run(&thread, outcome.reply).await;
            info!(
                correlation_id = %invocation.correlation_id,
                responder,
                outcome = ?relay_outcome,
                "Pipeline finished"
            );
        }
        Err(e) => {
            // Dispatch failed before any placeholder existed; leave the user
            // an error message rather than silence.
            warn!(
                correlation_id = %invocation.correlation_id,
                error = %e,
                "Dispatch failed"
            );
            if let Err(post_error) = ctx.sink.post(&thread, &e.user_message()).await {
                error!(error = %post_error, "Could not deliver dispatch error to thread");
            }
        }
    }
}
