//! threadrelay - Main Entry Point
//!
//! Loads configuration, builds the handler registry and chat sink, and runs
//! the webhook server until a shutdown signal arrives. Configuration problems
//! fail here, at startup, never on a user's question.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use threadrelay::chat::{HttpChatSink, HttpChatSinkConfig};
use threadrelay::config::BotConfig;
use threadrelay::dispatch::{registry, Dispatcher};
use threadrelay::handlers::builtin::{build_handler_store, GENERAL_ASSISTANT};
use threadrelay::handlers::{
    AgentHandler, HandlerStore, InvocationContext, RemoteAgentConfig, RemoteAgentHandler,
};
use threadrelay::knowledge::KnowledgeStore;
use threadrelay::observability::init_default_logging;
use threadrelay::relay::{Relay, RelayOptions};
use threadrelay::webhook::{self, WebhookContext};
use tokio::signal;
use tracing::{error, info};

/// Chat-thread question bot
#[derive(Parser)]
#[command(name = "threadrelay")]
#[command(about = "Answers questions in chat threads with live-updating responses")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Dispatch one question locally and print the answer
    Ask {
        /// The question to ask
        query: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting threadrelay v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Config { show } => handle_config_command(config, show),
        Commands::Ask { query } => handle_ask_command(config, query).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<BotConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BotConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            let default_paths = vec!["threadrelay.toml", "config/threadrelay.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BotConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create threadrelay.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_bot(config: BotConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Application starting with bot ID: {}", config.bot.id);

    let handlers = build_handlers(&config)?;
    // Table/enum/store mismatches crash here, before traffic arrives.
    registry::validate_bindings(&handlers)?;

    let sink = Arc::new(HttpChatSink::new(HttpChatSinkConfig {
        base_url: config.chat.base_url.clone(),
        token: config.get_chat_token()?,
        timeout: Duration::from_secs(config.chat.timeout_secs),
    })?);

    let ctx = Arc::new(WebhookContext {
        bot_id: config.bot.id.clone(),
        dispatcher: Dispatcher::new(handlers),
        relay: Relay::new(sink.clone(), RelayOptions::from(&config.relay)),
        sink,
        signing_secret: config.get_signing_secret()?,
        freshness_window_secs: config.webhook.freshness_window_secs,
    });

    let addr: SocketAddr = config.webhook.bind_addr.parse()?;

    // Graceful shutdown on SIGINT/SIGTERM
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    info!("Bot is running and waiting for webhook deliveries...");
    webhook::serve(ctx, addr, shutdown).await;

    info!("Application shutdown initiated");
    Ok(())
}

/// Bootstrap factory - builds the handler store with injected dependencies
fn build_handlers(config: &BotConfig) -> Result<Arc<HandlerStore>, Box<dyn std::error::Error>> {
    let knowledge = Arc::new(KnowledgeStore::load(Path::new(&config.knowledge.data_dir))?);

    // The general responder streams from the agent service when one is
    // configured; otherwise the local fallback answers directly.
    let remote_general: Option<Arc<dyn AgentHandler>> = match &config.agent_api {
        Some(section) => {
            let api_key = config.get_agent_api_key()?.ok_or_else(|| {
                threadrelay::BotError::configuration("agent_api requires an API key")
            })?;
            Some(Arc::new(RemoteAgentHandler::new(
                GENERAL_ASSISTANT,
                RemoteAgentConfig {
                    base_url: section.base_url.clone(),
                    api_key,
                    timeout: Duration::from_secs(section.timeout_secs),
                },
            )?))
        }
        None => None,
    };

    Ok(Arc::new(build_handler_store(knowledge, remote_general)?))
}

fn handle_config_command(config: BotConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

async fn handle_ask_command(
    config: BotConfig,
    query: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let handlers = build_handlers(&config)?;
    registry::validate_bindings(&handlers)?;

    let dispatcher = Dispatcher::new(handlers);
    let ctx = InvocationContext::new("cli", None);

    let outcome = dispatcher.dispatch(&query, None, &ctx).await?;
    let display_name = outcome.display_name;
    let text = outcome.reply.collect_text().await?;

    println!("[{display_name}]");
    println!("{text}");
    Ok(())
}
