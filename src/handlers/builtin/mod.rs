//! Built-in knowledge-backed responders
//!
//! These answer directly from the local knowledge store with a single final
//! text. Search quality is deliberately simple (substring scan over loaded
//! JSON); anything smarter lives behind the remote responder API.

use crate::error::BotResult;
use crate::handlers::{AgentHandler, HandlerReply, HandlerStore, InvocationContext};
use crate::knowledge::{KnowledgeStore, Lookup};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Handler IDs used by the dispatch table
pub const STARTUP_ANALYST: &str = "startup-analyst";
pub const EVENTS_GUIDE: &str = "events-guide";
pub const PEOPLE_DIRECTORY: &str = "people-directory";
pub const SCHEDULE_ASSISTANT: &str = "schedule-assistant";
pub const GENERAL_ASSISTANT: &str = "general-assistant";

/// Maximum entries quoted in one chat answer
const MAX_ANSWER_ITEMS: usize = 5;

/// Query words too common to be useful search terms
const STOPWORDS: &[&str] = &[
    "what", "when", "where", "which", "who", "whom", "whose", "about", "does", "have", "that",
    "this", "there", "their", "with", "from", "many", "much", "list", "tell", "show", "give",
    "them", "some", "any", "the", "are", "is", "how",
];

/// Responder answering from one knowledge collection
pub struct CollectionResponder {
    id: &'static str,
    collection: &'static str,
    topic: &'static str,
    store: Arc<KnowledgeStore>,
}

impl CollectionResponder {
    pub fn new(
        id: &'static str,
        collection: &'static str,
        topic: &'static str,
        store: Arc<KnowledgeStore>,
    ) -> Self {
        Self {
            id,
            collection,
            topic,
            store,
        }
    }

    async fn answer(&self, query: &str) -> String {
        for term in significant_terms(query) {
            let lookup = self.store.search(self.collection, &term).await;
            if lookup.found {
                debug!(handler_id = self.id, term = %term, hits = lookup.items.len(), "Knowledge hit");
                return format_lookup(&lookup, &term, self.topic);
            }
        }

        // No term matched; fall back to the collection itself so "list the
        // events" style questions still get something useful.
        let all = self.store.all(self.collection).await;
        if all.found {
            return format!(
                "I know about {} {}. Here are a few:\n{}",
                all.items.len(),
                self.topic,
                format_items(&all.items)
            );
        }

        format!("I don't have any {} data loaded right now.", self.topic)
    }
}

#[async_trait]
impl AgentHandler for CollectionResponder {
    fn id(&self) -> &str {
        self.id
    }

    async fn invoke(&self, query: &str, _ctx: &InvocationContext) -> BotResult<HandlerReply> {
        Ok(HandlerReply::Text(self.answer(query).await))
    }
}

/// Fallback responder for questions outside every specialized category
pub struct GeneralResponder {
    store: Arc<KnowledgeStore>,
}

impl GeneralResponder {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AgentHandler for GeneralResponder {
    fn id(&self) -> &str {
        GENERAL_ASSISTANT
    }

    async fn invoke(&self, query: &str, _ctx: &InvocationContext) -> BotResult<HandlerReply> {
        // Try every collection before giving up.
        for term in significant_terms(query) {
            for name in self.store.collection_names().await {
                let lookup = self.store.search(&name, &term).await;
                if lookup.found {
                    return Ok(HandlerReply::Text(format_lookup(&lookup, &term, &name)));
                }
            }
        }

        let names = self.store.collection_names().await;
        let text = if names.is_empty() {
            "I don't have an answer for that yet.".to_string()
        } else {
            format!(
                "I couldn't match that to anything I know. I can answer questions about: {}.",
                names.join(", ")
            )
        };
        Ok(HandlerReply::Text(text))
    }
}

/// Build the handler store for the configured deployment.
///
/// When a remote general responder is supplied it takes the general slot and
/// streams progress; otherwise the local fallback answers directly.
pub fn build_handler_store(
    store: Arc<KnowledgeStore>,
    remote_general: Option<Arc<dyn AgentHandler>>,
) -> BotResult<HandlerStore> {
    let mut handlers = HandlerStore::new();

    handlers.register(Arc::new(CollectionResponder::new(
        STARTUP_ANALYST,
        "startups",
        "startups",
        store.clone(),
    )))?;
    handlers.register(Arc::new(CollectionResponder::new(
        EVENTS_GUIDE,
        "events",
        "events",
        store.clone(),
    )))?;
    handlers.register(Arc::new(CollectionResponder::new(
        PEOPLE_DIRECTORY,
        "people",
        "people",
        store.clone(),
    )))?;
    handlers.register(Arc::new(CollectionResponder::new(
        SCHEDULE_ASSISTANT,
        "schedule",
        "schedule entries",
        store.clone(),
    )))?;

    match remote_general {
        Some(remote) => handlers.register(remote)?,
        None => handlers.register(Arc::new(GeneralResponder::new(store)))?,
    }

    Ok(handlers)
}

/// Words worth searching for, in query order.
fn significant_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.len() >= 3 && !STOPWORDS.contains(&word.as_str()))
        .collect()
}

fn format_lookup(lookup: &Lookup, term: &str, topic: &str) -> String {
    format!(
        "Here's what I found about \"{term}\" in {topic}:\n{}",
        format_items(&lookup.items)
    )
}

fn format_items(items: &[Value]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(MAX_ANSWER_ITEMS)
        .map(format_entry)
        .collect();

    if items.len() > MAX_ANSWER_ITEMS {
        lines.push(format!("…and {} more.", items.len() - MAX_ANSWER_ITEMS));
    }

    lines.join("\n")
}

fn format_entry(entry: &Value) -> String {
    let title = entry
        .get("name")
        .or_else(|| entry.get("title"))
        .and_then(Value::as_str);
    let detail = entry
        .get("summary")
        .or_else(|| entry.get("description"))
        .and_then(Value::as_str);

    match (title, detail) {
        (Some(title), Some(detail)) => format!("• {title}: {detail}"),
        (Some(title), None) => format!("• {title}"),
        _ => format!("• {entry}"),
    }
}
