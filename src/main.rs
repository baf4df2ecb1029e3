//! Weather API gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                     WEATHER GATEWAY                       │
//!                  │                                                           │
//!   GET /weather   │  ┌─────────┐    ┌──────────────┐    ┌──────────────┐      │
//!   ───────────────┼─▶│  http   │───▶│ orchestrator │───▶│    cache     │      │
//!                  │  │ server  │    │ state machine│    └──────────────┘      │
//!                  │  └─────────┘    └──────┬───────┘                          │
//!                  │                        │ rate limit → breaker → lock      │
//!                  │                        ▼                                  │
//!                  │                 ┌──────────────┐    ┌──────────────┐      │   Weather
//!                  │                 │   upstream   │───▶│  transform   │◀─────┼── provider
//!                  │                 │ client+retry │    └──────────────┘      │
//!                  │                 └──────────────┘                          │
//!                  │                                                           │
//!                  │   store (TTL, CAS, counters) · config reload · metrics    │
//!                  │   admin API · graceful shutdown                           │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use weather_gateway::config::{finalize_config, load_config, ConfigWatcher};
use weather_gateway::lifecycle::signals::spawn_signal_listener;
use weather_gateway::observability::{logging, metrics};
use weather_gateway::store::{Clock, MemoryStore, Store, SystemClock};
use weather_gateway::{admin, GatewayConfig, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "weather-gateway")]
#[command(about = "Caching, rate-limited gateway in front of a weather provider", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => finalize_config(GatewayConfig::default())?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "weather-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        hourly_limit = config.rate_limit.hourly_limit,
        request_timeout_ms = config.timeouts.request_ms,
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

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let memory = MemoryStore::new(clock.clone());
    tokio::spawn(
        memory
            .clone()
            .run_sweeper(config.cache.sweep_interval(), shutdown.subscribe()),
    );
    let store: Arc<dyn Store> = Arc::new(memory);

    // The watcher handle must stay alive for events to keep flowing.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let server = HttpServer::new(config.clone(), store, clock)?;

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let admin_state = server.state();
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::run_admin(admin_listener, admin_state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
