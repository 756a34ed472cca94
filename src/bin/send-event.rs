//! Webhook Event Injection Utility
//!
//! Signs and POSTs a sample message delivery to a locally running bot.
//! Useful for exercising the full dispatch-and-relay pipeline without a
//! chat platform in the loop.
//!
//! ## Usage
//!
//! ```bash
//! # Simple question
//! send-event --text "How many startups raised funding?"
//!
//! # Custom channel and thread
//! send-event --text "what's on today" --channel C042 --thread 1717171717.0001
//!
//! # Against a non-default server
//! send-event --url http://localhost:8080/webhook/event --text "hello"
//! ```

use clap::Parser;
use serde_json::json;
use threadrelay::webhook::signature::compute_signature;

#[derive(Parser)]
#[command(
    name = "send-event",
    about = "Sign and POST a test message delivery to a running threadrelay bot"
)]
struct Args {
    /// Webhook endpoint URL
    #[arg(long, default_value = "http://127.0.0.1:3000/webhook/event")]
    url: String,

    /// Message text to deliver
    #[arg(long, required = true)]
    text: String,

    /// Sender identifier
    #[arg(long, default_value = "U-dev")]
    sender: String,

    /// Channel identifier
    #[arg(long, default_value = "C-dev")]
    channel: String,

    /// Thread identifier (omit for a top-level message)
    #[arg(long)]
    thread: Option<String>,

    /// Signing secret shared with the bot
    #[arg(long, env = "WEBHOOK_SIGNING_SECRET")]
    secret: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let body = serde_json::to_string(&json!({
        "text": args.text,
        "sender": args.sender,
        "channel": args.channel,
        "thread": args.thread,
    }))?;

    let timestamp = chrono::Utc::now().timestamp();
    let signature = compute_signature(&args.secret, timestamp, body.as_bytes());

    println!("\n📤 Delivering event to {}", args.url);
    println!("   Channel: {}", args.channel);
    if let Some(thread) = &args.thread {
        println!("   Thread: {thread}");
    }
    println!("   Text: {}", args.text);

    let response = reqwest::Client::new()
        .post(&args.url)
        .header("x-request-timestamp", timestamp.to_string())
        .header("x-signature", signature)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let reply = response.text().await.unwrap_or_default();

    if status.is_success() {
        println!("✓ Delivery accepted: {reply}");
    } else {
        eprintln!("✗ Delivery rejected ({status}): {reply}");
        std::process::exit(1);
    }

    Ok(())
}
