//! Intent-to-handler bindings
//!
//! Static table mapping each intent to a handler identifier and a display
//! name. The table and the `Intent` enum must stay in sync; that is a
//! build-time invariant enforced by `validate_bindings` at startup, so
//! `resolve` failing at request time would be a programming error.

use crate::classify::Intent;
use crate::error::{BotError, BotResult};
use crate::handlers::builtin::{
    EVENTS_GUIDE, GENERAL_ASSISTANT, PEOPLE_DIRECTORY, SCHEDULE_ASSISTANT, STARTUP_ANALYST,
};
use crate::handlers::HandlerStore;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One row of the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerBinding {
    pub handler_id: &'static str,
    pub display_name: &'static str,
}

/// The dispatch table. `Founders` intentionally aliases to the startup
/// analyst; founder questions are answered from the same data.
static BINDINGS: Lazy<HashMap<Intent, HandlerBinding>> = Lazy::new(|| {
    HashMap::from([
        (
            Intent::Startups,
            HandlerBinding {
                handler_id: STARTUP_ANALYST,
                display_name: "Startup Analyst",
            },
        ),
        (
            Intent::Founders,
            HandlerBinding {
                handler_id: STARTUP_ANALYST,
                display_name: "Startup Analyst",
            },
        ),
        (
            Intent::Events,
            HandlerBinding {
                handler_id: EVENTS_GUIDE,
                display_name: "Events Guide",
            },
        ),
        (
            Intent::People,
            HandlerBinding {
                handler_id: PEOPLE_DIRECTORY,
                display_name: "People Directory",
            },
        ),
        (
            Intent::Schedule,
            HandlerBinding {
                handler_id: SCHEDULE_ASSISTANT,
                display_name: "Schedule Assistant",
            },
        ),
        (
            Intent::General,
            HandlerBinding {
                handler_id: GENERAL_ASSISTANT,
                display_name: "Assistant",
            },
        ),
    ])
});

/// Look up the binding for an intent.
pub fn resolve(intent: Intent) -> BotResult<HandlerBinding> {
    BINDINGS.get(&intent).copied().ok_or_else(|| {
        BotError::configuration(format!(
            "intent '{}' has no handler binding; enum and table are out of sync",
            intent.name()
        ))
    })
}

/// Startup check: every intent resolves and its handler exists in the store.
///
/// Run once before serving traffic so a table/enum/store mismatch crashes the
/// process at boot instead of a user's question.
pub fn validate_bindings(store: &HandlerStore) -> BotResult<()> {
    for intent in Intent::ALL {
        let binding = resolve(intent)?;
        if store.get(binding.handler_id).is_none() {
            return Err(BotError::configuration(format!(
                "intent '{}' maps to handler '{}' which is not registered (have: {})",
                intent.name(),
                binding.handler_id,
                store.ids().join(", ")
            )));
        }
    }
    Ok(())
}
