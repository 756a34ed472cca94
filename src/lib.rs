//! threadrelay - chat-thread question bot
//!
//! Answers free-text questions inside chat threads. Each inbound message is
//! classified into an intent, dispatched to a specialized responder, and the
//! responder's incrementally-produced output is relayed back into a single
//! chat message edited in place, with animated progress.
//!
//! # Overview
//!
//! The crate is built around two subsystems:
//! - The **dispatcher** ([`classify`], [`dispatch`]): classifies a question
//!   against a fixed intent taxonomy and routes it to a live handler from the
//!   registry built at startup.
//! - The **relay** ([`relay`]): consumes the handler's event stream, renders
//!   progress into the placeholder message on a periodic tick, and guarantees
//!   exactly one terminal write -- the answer, a fallback, or an error --
//!   even when the handler fails mid-stream.
//!
//! Everything at the boundary (webhook verification, chat platform API,
//! knowledge files, the responder API) lives in its own module behind a
//! trait seam.
//!
//! # Quick Start
//!
//! ```rust
//! use threadrelay::classify::{classify, Intent};
//!
//! let classification = classify("How many startups raised funding?");
//! assert_eq!(classification.intent, Intent::Startups);
//! assert_eq!(
//!     classification.normalized_query,
//!     "How many startups raised funding?"
//! );
//! ```

pub mod chat;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod knowledge;
pub mod observability;
pub mod relay;
pub mod testing;
pub mod webhook;

pub use chat::{ChatSink, HttpChatSink, MessageHandle, ThreadRef};
pub use classify::{classify, Classification, Intent};
pub use config::BotConfig;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{BotError, BotResult};
pub use handlers::{AgentEvent, AgentHandler, HandlerReply, HandlerStore};
pub use knowledge::KnowledgeStore;
pub use relay::{Relay, RelayOptions, RelayOutcome, RelayState};
