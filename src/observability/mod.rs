//! Observability
//!
//! Structured logging setup. Log output is the bot's only telemetry surface;
//! the webhook's /health route covers liveness.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
