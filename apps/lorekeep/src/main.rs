//! # Lorekeep
//!
//! The main binary for the Lorekeep worldbuilding graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  apps/lorekeep (THE BINARY)               │
//! │                                                           │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────┐   │
//! │  │    CLI      │    │   Config    │    │  HTTP Sink   │   │
//! │  │   (clap)    │    │   (toml)    │    │  (reqwest)   │   │
//! │  └──────┬──────┘    └──────┬──────┘    └──────┬───────┘   │
//! │         │                  │                  │           │
//! │         └──────────────────┼──────────────────┘           │
//! │                            ▼                              │
//! │                   ┌─────────────────┐                     │
//! │                   │  lorekeep-core  │                     │
//! │                   │  (THE KERNEL)   │                     │
//! │                   └─────────────────┘                     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! lorekeep init
//! lorekeep note "Gondor" -c LOCATION --container
//! lorekeep child note-1 "Minas Tirith" -c LOCATION
//! lorekeep stack note-1 "1=Kings" "2050=Stewards"
//! lorekeep undo
//! ```

use clap::Parser;
use lorekeep::cli;
use lorekeep::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    // RUST_LOG wins; otherwise --verbose raises the default level.
    let default_filter = if cli.verbose {
        "lorekeep=debug,lorekeep_core=debug"
    } else {
        "lorekeep=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.log.json() == Some(true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
