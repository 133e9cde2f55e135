//! # hivepatch
//!
//! Apply registry edits from a JSON document and keep an audit trail.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  apps/hivepatch (THE BINARY)                 │
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐  │
//! │  │    CLI      │    │   Prompt    │    │  Audit files    │  │
//! │  │  (clap)     │    │  (stdin)    │    │  (.save)        │  │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬────────┘  │
//! │         │                  │                    │           │
//! │         └──────────────────┼────────────────────┘           │
//! │                            ▼                                │
//! │                   ┌────────────────┐                        │
//! │                   │ hivepatch-core │                        │
//! │                   │  (THE LOGIC)   │                        │
//! │                   └────────────────┘                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Apply a document to the live registry (Windows)
//! hivepatch apply -c proxy.json
//!
//! # Work against a hive file instead
//! hivepatch -B hive -H lab.hive seed -c baseline.json
//! hivepatch -B hive -H lab.hive apply -c proxy.json --yes
//!
//! # Turn the audit file into a restore document
//! hivepatch rollback-plan -i proxy.json.1700000000.save -o restore.json
//! ```

use clap::Parser;
use hivepatch::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // HIVEPATCH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("HIVEPATCH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hivepatch=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!("hivepatch v{}", env!("CARGO_PKG_VERSION"));
    println!();
}
