//! # Rowbridge - Entity Graph (De)Composition Server
//!
//! The main binary for the Rowbridge data bridge.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for import/export operations
//! - TOML schema configuration for the type registry
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │               apps/rowbridge (THE BINARY)             │
//! │                                                       │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────┐  │
//! │  │   CLI       │    │   HTTP API  │    │  Schema  │  │
//! │  │  (clap)     │    │   (axum)    │    │  (toml)  │  │
//! │  └──────┬──────┘    └──────┬──────┘    └────┬─────┘  │
//! │         │                  │                │        │
//! │         └──────────────────┼────────────────┘        │
//! │                            ▼                         │
//! │                   ┌─────────────────┐                │
//! │                   │ rowbridge-core  │                │
//! │                   │  (THE LOGIC)    │                │
//! │                   └─────────────────┘                │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! rowbridge server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! rowbridge status
//! rowbridge import -f document.json
//! rowbridge export -t User -k alice -d 4
//! ```

use clap::Parser;
use rowbridge::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — BRIDGE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("BRIDGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rowbridge=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Rowbridge startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗  ██████╗ ██╗    ██╗██████╗ ██████╗ ██╗██████╗  ██████╗ ███████╗
  ██╔══██╗██╔═══██╗██║    ██║██╔══██╗██╔══██╗██║██╔══██╗██╔════╝ ██╔════╝
  ██████╔╝██║   ██║██║ █╗ ██║██████╔╝██████╔╝██║██║  ██║██║  ███╗█████╗
  ██╔══██╗██║   ██║██║███╗██║██╔══██╗██╔══██╗██║██║  ██║██║   ██║██╔══╝
  ██║  ██║╚██████╔╝╚███╔███╔╝██████╔╝██║  ██║██║██████╔╝╚██████╔╝███████╗
  ╚═╝  ╚═╝ ╚═════╝  ╚══╝╚══╝ ╚═════╝ ╚═╝  ╚═╝╚═╝╚═════╝  ╚═════╝ ╚══════╝

  Entity Graph Data Bridge v{}

  Flat Rows • Natural Keys • Reference Tokens
"#,
        env!("CARGO_PKG_VERSION")
    );
}
