//! AJP13 connector.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  AJP CONNECTOR                   │
//!                        │                                                  │
//!   Web server (AJP13)   │  ┌─────────┐   ┌─────────┐   ┌───────────────┐   │
//!   ─────────────────────┼─▶│   net   │──▶│ session │──▶│ RequestHandler│   │
//!                        │  │listener │   │ worker  │   │   (echo)      │   │
//!                        │  └─────────┘   └────┬────┘   └───────────────┘   │
//!                        │                     │ protocol (framer, decode,  │
//!   ◀────────────────────┼─────────────────────┘  forward, response)        │
//!                        │                                                  │
//!                        │  ┌──────────────────────────────────────────┐    │
//!                        │  │          Cross-Cutting Concerns          │    │
//!                        │  │  config · watchdog · observability ·     │    │
//!                        │  │  lifecycle (signals, shutdown)           │    │
//!                        │  └──────────────────────────────────────────┘    │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use ajp_connector::config::{load_config, validate_config, ConnectorConfig};
use ajp_connector::lifecycle::{signals, Shutdown};
use ajp_connector::net::Listener;
use ajp_connector::observability::{logging, metrics};
use ajp_connector::{Connector, EchoHandler};

#[derive(Parser)]
#[command(name = "ajp-connector")]
#[command(about = "AJP13 connector with a deadlock watchdog", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = ConnectorConfig::default();
            validate_config(&config).map_err(|errors| format!("invalid defaults: {errors:?}"))?;
            config
        }
    };

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("ajp-connector v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        watchdog_enabled = config.watchdog.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    Connector::new(config, EchoHandler::new())
        .run(listener, shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
