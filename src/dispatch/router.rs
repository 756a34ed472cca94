//! Dispatch router
//!
//! Orchestrates one inbound question: classify, resolve the binding, invoke
//! the live handler with the normalized query. The router does not retry and
//! does not touch the chat sink; handler failures propagate to the caller
//! (the relay pipeline), which owns user-visible error delivery.

use crate::classify::classify;
use crate::dispatch::registry;
use crate::error::{BotError, BotResult};
use crate::handlers::{HandlerReply, HandlerStore, InvocationContext};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of dispatching one question
pub struct DispatchOutcome {
    /// Display name of the responder that answered, for logs and attribution
    pub display_name: &'static str,
    /// The handler's reply, final text or progress stream
    pub reply: HandlerReply,
}

/// Routes classified questions to live handler instances
pub struct Dispatcher {
    handlers: Arc<HandlerStore>,
}

impl Dispatcher {
    /// Create a dispatcher over an already-validated handler store
    pub fn new(handlers: Arc<HandlerStore>) -> Self {
        Self { handlers }
    }

    /// Dispatch a raw chat message.
    ///
    /// `enrichment` is an optional short context string derived from prior
    /// conversation turns (resolving references like "the first two"); it is
    /// the caller's responsibility to produce it, and it is prepended to the
    /// normalized query when present.
    pub async fn dispatch(
        &self,
        raw_text: &str,
        enrichment: Option<&str>,
        ctx: &InvocationContext,
    ) -> BotResult<DispatchOutcome> {
        let classification = classify(raw_text);
        let binding = registry::resolve(classification.intent)?;

        debug!(
            intent = classification.intent.name(),
            handler_id = binding.handler_id,
            normalized = %classification.normalized_query,
            "Classified inbound question"
        );

        let handler = self
            .handlers
            .get(binding.handler_id)
            .ok_or_else(|| BotError::handler_not_found(binding.handler_id))?;

        let query = match enrichment {
            Some(context) if !context.is_empty() => {
                format!("{context}\n\n{}", classification.normalized_query)
            }
            _ => classification.normalized_query.clone(),
        };

        let reply = handler.invoke(&query, ctx).await?;

        info!(
            correlation_id = %ctx.correlation_id,
            intent = classification.intent.name(),
            handler_id = binding.handler_id,
            "Dispatched question to responder"
        );

        Ok(DispatchOutcome {
            display_name: binding.display_name,
            reply,
        })
    }
}
