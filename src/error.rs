//! Error types for the dispatch and relay pipeline
//!
//! One taxonomy for the whole crate: configuration problems are fatal at
//! startup, auth failures are rejected at the webhook boundary, and everything
//! the Relay can recover from is converted into a short chat-safe message.

use thiserror::Error;

/// Main error type for dispatch and relay operations
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Handler not found: {handler_id}")]
    HandlerNotFound { handler_id: String },

    #[error("Handler execution failed: {message}")]
    HandlerExecution { message: String },

    #[error("Chat transport error: {message}")]
    Transport { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl BotError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a handler-not-found error
    pub fn handler_not_found<S: Into<String>>(handler_id: S) -> Self {
        Self::HandlerNotFound {
            handler_id: handler_id.into(),
        }
    }

    /// Create a handler execution error
    pub fn handler_execution<S: Into<String>>(message: S) -> Self {
        Self::HandlerExecution {
            message: message.into(),
        }
    }

    /// Create a chat transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Render this error as a short message safe to post into a chat thread.
    ///
    /// Sanitized so that internal details (secrets, file paths) never reach
    /// the channel, and phrased for a user rather than an operator.
    pub fn user_message(&self) -> String {
        let detail = match self {
            BotError::HandlerExecution { message } => message.clone(),
            BotError::Transport { message } => message.clone(),
            BotError::HandlerNotFound { handler_id } => {
                format!("no responder is configured for '{handler_id}'")
            }
            other => other.to_string(),
        };
        format!(
            ":warning: Sorry, I couldn't finish answering that ({}).",
            sanitize_error_message(&detail)
        )
    }
}

/// Sanitize error messages before they leave the process boundary
fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    // Remove common secret patterns
    sanitized = regex::Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+")
        .unwrap()
        .replace_all(&sanitized, "${1}=***")
        .to_string();

    // Remove potential file paths that might contain sensitive info
    sanitized =
        regex::Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
            .unwrap()
            .replace_all(&sanitized, "/***REDACTED***/")
            .to_string();

    // Truncate very long messages - ensure total length is <= 300
    if sanitized.len() > 300 {
        let truncate_suffix = "...[truncated]";
        let max_content_len = 300 - truncate_suffix.len();
        sanitized = format!("{}{}", &sanitized[..max_content_len], truncate_suffix);
    }

    sanitized
}

/// Result type for bot operations
pub type BotResult<T> = Result<T, BotError>;
