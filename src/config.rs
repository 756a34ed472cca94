//! Configuration system for the thread-relay bot
//!
//! TOML-backed configuration with environment-variable indirection for
//! secrets. Secrets are referenced by `*_env` fields and resolved at runtime,
//! never stored in the file. Validation happens at load time so that a
//! misconfigured bot fails at startup, not on the first inbound message.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level bot configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    pub bot: BotSection,
    pub chat: ChatSection,
    pub webhook: WebhookSection,
    pub knowledge: KnowledgeSection,
    #[serde(default)]
    pub relay: RelaySection,
    /// Remote responder API (optional). When present, the general responder
    /// is served by the remote agent service and streams progress events.
    pub agent_api: Option<AgentApiSection>,
}

/// Bot identity section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotSection {
    /// Bot identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Description of what this bot answers
    pub description: String,
}

/// Chat platform web API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSection {
    /// Base URL of the chat platform web API
    pub base_url: String,
    /// Environment variable containing the bot token
    pub token_env: String,
    /// Request timeout in seconds
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_chat_timeout_secs() -> u64 {
    30
}

/// Inbound webhook server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookSection {
    /// Address to bind the webhook server to, e.g. "0.0.0.0:3000"
    pub bind_addr: String,
    /// Environment variable containing the shared signing secret
    pub signing_secret_env: String,
    /// Reject requests whose timestamp is older than this window
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,
}

fn default_freshness_window_secs() -> u64 {
    300 // 5 minutes
}

/// Knowledge base files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeSection {
    /// Directory containing the knowledge JSON files
    pub data_dir: String,
}

/// Relay timing and retry policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaySection {
    /// Animation tick interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Pause after a tool or workflow-step start, to avoid flicker
    #[serde(default = "default_tool_pause_ms")]
    pub tool_pause_ms: u64,
    /// Attempts for the terminal message write
    #[serde(default = "default_final_write_attempts")]
    pub final_write_attempts: u32,
    /// Fixed backoff between terminal write attempts in milliseconds
    #[serde(default = "default_final_write_backoff_ms")]
    pub final_write_backoff_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    300
}

fn default_tool_pause_ms() -> u64 {
    350
}

fn default_final_write_attempts() -> u32 {
    3
}

fn default_final_write_backoff_ms() -> u64 {
    500
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            tool_pause_ms: default_tool_pause_ms(),
            final_write_attempts: default_final_write_attempts(),
            final_write_backoff_ms: default_final_write_backoff_ms(),
        }
    }
}

/// Remote responder API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentApiSection {
    /// Base URL of the agent invocation service
    pub base_url: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    #[serde(default = "default_agent_api_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_agent_api_timeout_secs() -> u64 {
    120
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid bot ID format: {0}")]
    InvalidBotId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BotConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BotConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bot_id(&self.bot.id)?;

        url::Url::parse(&self.chat.base_url).map_err(|e| {
            ConfigError::InvalidConfig(format!("chat.base_url is not a valid URL: {e}"))
        })?;

        if let Some(ref agent_api) = self.agent_api {
            url::Url::parse(&agent_api.base_url).map_err(|e| {
                ConfigError::InvalidConfig(format!("agent_api.base_url is not a valid URL: {e}"))
            })?;
        }

        self.webhook
            .bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                ConfigError::InvalidConfig(format!(
                    "webhook.bind_addr is not a valid socket address: {e}"
                ))
            })?;

        if self.relay.final_write_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "relay.final_write_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the chat bot token from its environment variable
    pub fn get_chat_token(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.chat.token_env)
    }

    /// Get the webhook signing secret from its environment variable
    pub fn get_signing_secret(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.webhook.signing_secret_env)
    }

    /// Get the remote responder API key, if an agent API is configured
    pub fn get_agent_api_key(&self) -> Result<Option<String>, ConfigError> {
        match &self.agent_api {
            Some(section) => Ok(Some(Self::get_env_var_required(&section.api_key_env)?)),
            None => Ok(None),
        }
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[bot]
id = "test-bot"
description = "A test bot"

[chat]
base_url = "http://localhost:9999/api"
token_env = "CHAT_BOT_TOKEN"

[webhook]
bind_addr = "127.0.0.1:3000"
signing_secret_env = "WEBHOOK_SIGNING_SECRET"

[knowledge]
data_dir = "data"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate bot ID format
fn validate_bot_id(bot_id: &str) -> Result<(), ConfigError> {
    let valid_chars = bot_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if bot_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidBotId(format!(
            "Bot ID '{bot_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
