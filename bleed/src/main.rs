//! Bleed: a branching safety story with a themed chatbot.
//!
//! `bleed serve` runs the chat endpoint the browser client talks to.
//!
//! # Headless Mode
//!
//! Run with `--headless` to play in a terminal, suitable for automated testing:
//!
//! ```bash
//! cargo run -p bleed -- --headless --character eli --name neo
//! ```

mod config;
mod headless;
mod server;

use bleed_core::{CompletionService, Offline};
use config::{HeadlessConfig, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so the headless protocol owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|a| a == "--headless") {
        let config = HeadlessConfig::from_env_and_args(&args)?;
        return headless::run_headless(config).await;
    }

    let config = ServerConfig::from_env_and_args(&args)?;
    let service: Arc<dyn CompletionService> = match completion::Client::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "completion client ready");
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "completion API unavailable; /api/chat will report a glitch");
            Arc::new(Offline)
        }
    };
    server::serve(config, service).await
}

fn print_help() {
    println!("Bleed - branching safety story with a themed chatbot");
    println!();
    println!("USAGE:");
    println!("  bleed [serve] [--port <PORT>]");
    println!("  bleed --headless [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --port <PORT>       Port for the chat server (default: 3001, env PORT)");
    println!("  --headless          Play in the terminal instead of serving");
    println!();
    println!("HEADLESS OPTIONS (only with --headless):");
    println!("  --character <KEY>   maya, eli or stanley (default: maya)");
    println!("  --name <NAME>       Player display name");
    println!("  --assets <DIR|URL>  Base holding stories/, knowledge/, characters/ (env BLEED_ASSETS)");
    println!("  --server <URL>      Use a running chat server instead of the API directly");
    println!();
    println!("ENVIRONMENT:");
    println!("  OPENAI_API_KEY, OPENAI_MODEL, OPENAI_BASE_URL");
    println!("  BLEED_CHARACTERS_DIR, BLEED_KNOWLEDGE_DIR, BLEED_MAX_SESSIONS (server)");
    println!("  RUST_LOG (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("  bleed                                   # Serve on port 3001");
    println!("  bleed serve --port 8080");
    println!("  bleed --headless --character eli --name neo");
    println!("  bleed --headless --server http://localhost:3001");
}
