//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, metrics, limits, request ID, headers)
//! - Bind server to listener
//! - Apply hot-reloaded config to the running service
//! - Release hanging reads on shutdown so the drain is quick

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::handlers::{get_limits, get_status, health, read_colors, write_colors};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{no_store_layer, nosniff_layer};
use crate::observability::metrics;
use crate::palette::service::ConfigService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConfigService>,
    pub max_body_size: usize,
}

/// HTTP front end for the palette service.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    service: Arc<ConfigService>,
}

impl HttpServer {
    /// Create a new HTTP server around an already-built service.
    pub fn new(config: ServerConfig, service: Arc<ConfigService>) -> Self {
        let state = AppState {
            service: Arc::clone(&service),
            max_body_size: config.security.max_body_size,
        };
        let router = Self::build_router(&config, state);

        Self {
            router,
            config,
            service,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/colors", get(read_colors).post(write_colors))
            .route("/limits", get(get_limits))
            .route("/status", get(get_status))
            .route("/health", get(health))
            .route_layer(middleware::from_fn(metrics::track_requests))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(no_store_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer());

        if config.security.enable_headers {
            router.layer(nosniff_layer())
        } else {
            router
        }
    }

    /// A clone of the router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Config updates arriving on `config_updates` are applied live; the
    /// server stops when `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_wait_ms = self.config.long_poll.max_wait_ms,
            "HTTP server starting"
        );

        let reload_service = Arc::clone(&self.service);
        let mut active_config = self.config.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                apply_reload(&reload_service, &active_config, &new_config);
                active_config = new_config;
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let service = Arc::clone(&self.service);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                service.close_waiters();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<ConfigService> {
        &self.service
    }
}

fn apply_reload(service: &ConfigService, active: &ServerConfig, next: &ServerConfig) {
    service.apply_policy(next.service_policy());

    let restart_needed = active.listener != next.listener
        || active.storage != next.storage
        || active.timeouts != next.timeouts
        || active.security != next.security
        || active.observability != next.observability;
    if restart_needed {
        tracing::warn!(
            "Config changes outside [palette] and [long_poll] take effect after a restart"
        );
    }
}
