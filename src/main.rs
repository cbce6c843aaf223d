//! TCP Balancing Proxy
//!
//! Accepts client connections, picks a backend per client and relays one
//! request/response exchange.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                BALANCING PROXY                │
//!     Client Request       │  ┌────────────┐   ┌───────────────────────┐  │
//!     ─────────────────────┼─▶│   proxy    │──▶│     load_balancer     │  │
//!                          │  │ dispatcher │   │ session → registry →  │  │
//!                          │  └─────┬──────┘   │ round robin / key hash│  │
//!                          │        │          └───────────────────────┘  │
//!                          │        ▼                      ▲              │
//!     Client Response      │  ┌────────────┐   ┌───────────┴───────────┐  │
//!     ◀────────────────────┼──│  forward   │   │   health (probe loop) │  │
//!                          │  │  (one buf) │   └───────────────────────┘  │
//!                          │  └─────┬──────┘                              │
//!                          │        ▼                                     │
//!                          │  ┌────────────┐                              │ ──── Backend
//!                          │  │ net::Conn  │◀─────────────────────────────┼────  Server
//!                          │  └────────────┘                              │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use balancing_proxy::config::{load_config, ProxyConfig};
use balancing_proxy::observability::{logging, metrics};
use balancing_proxy::session::{MemorySessionStore, SessionStore};
use balancing_proxy::{ProxyDispatcher, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "balancing-proxy", version, about = "TCP load-balancing reverse proxy")]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!("balancing-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backlog = config.listener.backlog,
        algorithm = %config.balancing.algorithm,
        backends = config.balancing.backends.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store: Arc<dyn SessionStore> = match &config.session.persistence_path {
        Some(path) => Arc::new(MemorySessionStore::load_from_file(path)?),
        None => Arc::new(MemorySessionStore::new(None)),
    };

    let mut dispatcher = ProxyDispatcher::bind(&config, store).await?;
    dispatcher.listen()?;

    let shutdown = Shutdown::new();
    let server = tokio::spawn(dispatcher.run(shutdown.subscribe()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl+C received, shutting down");
    shutdown.trigger();

    server.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
