//! Palette configuration server.
//!
//! # Architecture Overview
//!
//! ```text
//!   POST /colors ──▶ http ──▶ validator ──▶ store ──▶ durable backend
//!                                            │
//!                                            ▼ on_replace
//!   GET /colors?hang=1 ──▶ http ──▶ coordinator (bounded wait) ──▶ JSON
//!
//!   Cross-cutting: config (TOML + hot reload), observability
//!   (tracing, Prometheus), lifecycle (startup, signals, shutdown)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use palette_server::config::{load_config, validate_config, watcher::ConfigWatcher, ConfigError};
use palette_server::lifecycle::{build_service, signals::shutdown_signal, Shutdown};
use palette_server::observability::{logging, metrics};
use palette_server::{HttpServer, ServerConfig};

#[derive(Parser)]
#[command(name = "palette-server")]
#[command(
    about = "Serves the current color palette with long-poll change notification",
    long_about = None
)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Reload palette rules and the long-poll bound when the config file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);

    tracing::info!("palette-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        storage = ?config.storage.backend,
        max_wait_ms = config.long_poll.max_wait_ms,
        request_timeout_secs = config.timeouts.request_secs,
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

    let service = build_service(&config)?;

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config, service);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
