//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use palette_sdk::PaletteClient;
use palette_server::config::ServerConfig;
use palette_server::lifecycle::{build_service, Shutdown};
use palette_server::palette::{ConfigService, ConfigStore, MemoryStore, ServicePolicy};
use palette_server::HttpServer;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A server running on an ephemeral port. Shuts down when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub service: Arc<ConfigService>,
    pub config_updates: mpsc::UnboundedSender<ServerConfig>,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> PaletteClient {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();
        PaletteClient::with_client(http, &self.url())
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Default test config: loopback, short long-poll bound, metrics off.
pub fn test_config(max_wait: Duration) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.long_poll.max_wait_ms = max_wait.as_millis() as u64;
    config.timeouts.request_secs = 10;
    config.observability.metrics_enabled = false;
    config
}

/// Start a server with the memory backend built from `config`.
#[allow(dead_code)]
pub async fn start_server(config: ServerConfig) -> TestServer {
    let service = build_service(&config).unwrap();
    start_with_service(config, service).await
}

/// Start a server around a caller-supplied durable store, for fault injection.
#[allow(dead_code)]
pub async fn start_with_store(config: ServerConfig, durable: Arc<MemoryStore>) -> TestServer {
    let store = Arc::new(ConfigStore::open(durable).unwrap());
    let policy: ServicePolicy = config.service_policy();
    let service = Arc::new(ConfigService::new(store, policy));
    start_with_service(config, service).await
}

async fn start_with_service(config: ServerConfig, service: Arc<ConfigService>) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, Arc::clone(&service));
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestServer {
        addr,
        service,
        config_updates,
        shutdown,
    }
}

/// Poll until `service` has at least `count` armed waiters.
#[allow(dead_code)]
pub async fn wait_for_waiters(service: &ConfigService, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while service.pending_waiters() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("waiters never armed");
}
