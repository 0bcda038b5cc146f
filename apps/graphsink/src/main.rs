//! # graphsink - Graph Element Serializer
//!
//! The main binary for the graphsink writer subsystem.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/graphsink (THE BINARY)              │
//! │                                                          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌─────────────┐   │
//! │  │  CLI (clap)  │──▶│ batch workers│──▶│ GraphWriter │   │
//! │  └──────────────┘   └──────────────┘   └──────┬──────┘   │
//! │                                               ▼          │
//! │                                     ┌────────────────┐   │
//! │                                     │ graphsink-core │   │
//! │                                     │ (THE WRITERS)  │   │
//! │                                     └────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! graphsink write -f metta -i records.jsonl -o out/ -j job1
//! graphsink write -f neo4j -i nodes.json -i edges.json -o import/job1 -j job1 --workers 8
//! graphsink plan -o import/job1 -j job1
//! graphsink inspect -o out/ --json-mode
//! ```

use clap::Parser;
use graphsink::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing — GRAPHSINK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("GRAPHSINK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "graphsink=debug,graphsink_core=debug"
    } else {
        "graphsink=info,graphsink_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so --json-mode output on stdout stays parseable.
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

    if !cli.quiet && !cli.json_mode {
        eprintln!("graphsink v{}", env!("CARGO_PKG_VERSION"));
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
