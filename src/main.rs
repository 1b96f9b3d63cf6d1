//! Madigan bridge
//!
//! ```text
//!                   ┌──────────────────────────────────────────────┐
//!                   │                  BRIDGE                       │
//!   HTTP clients    │  ┌────────┐   ┌──────────┐   ┌────────────┐  │    Device UIs
//!   ────────────────┼─▶│  http  │──▶│ registry │◀──│   device   │◀─┼──────────────
//!   /controls ...   │  │ router │   │ (by id)  │   │  sessions  │  │  framed TCP
//!                   │  └────────┘   └────┬─────┘   └────────────┘  │
//!                   │                    │ register                │
//!                   │                    ▼                         │
//!                   │              ┌───────────┐                   │
//!                   │              │ paraminfo │                   │
//!                   │              │  source   │                   │
//!                   │              └───────────┘                   │
//!                   └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::Path;
use tokio::net::TcpListener;

use madigan_bridge::config::{load_config, BridgeConfig};
use madigan_bridge::lifecycle::{build_source, shutdown_signal, Shutdown};
use madigan_bridge::net::Listener;
use madigan_bridge::observability::{logging, metrics};
use madigan_bridge::BridgeServer;

#[derive(Parser)]
#[command(name = "madigan-bridge")]
#[command(about = "Bridge between HTTP clients and connected device UIs", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(Path::new(path))?,
        None => BridgeConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "madigan-bridge starting");
    tracing::info!(
        http_address = %config.http.bind_address,
        device_address = %config.devices.bind_address,
        max_connections = config.devices.max_connections,
        config_file = args.config.as_deref().unwrap_or("<defaults>"),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let source = build_source(&config.parameters)?;

    let http_listener = TcpListener::bind(&config.http.bind_address).await?;
    let device_listener = Listener::bind(&config.devices).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    let server = BridgeServer::new(config, source);
    server.run(http_listener, device_listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
