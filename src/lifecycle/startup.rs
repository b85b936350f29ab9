//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the configured durable backend
//! - Open the store (materializing the default on first run)
//! - Build the service with the configured policy
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last, in `main`, so traffic only arrives once the store
//!   is ready

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ServerConfig, StorageBackend};
use crate::palette::durable::{DurableStore, JsonFileStore, MemoryStore, StorageError};
use crate::palette::service::ConfigService;
use crate::palette::store::ConfigStore;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("storage.path is required for the file backend")]
    MissingStoragePath,

    #[error("failed to open palette store: {0}")]
    Storage(#[from] StorageError),
}

/// Instantiate the durable backend named by the config.
pub fn open_durable(config: &ServerConfig) -> Result<Arc<dyn DurableStore>, StartupError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; the palette will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::File => {
            let path = config
                .storage
                .path
                .clone()
                .ok_or(StartupError::MissingStoragePath)?;
            tracing::info!(path = %path.display(), "Using file storage");
            Ok(Arc::new(JsonFileStore::new(path)))
        }
    }
}

/// Open storage and build the service described by `config`.
pub fn build_service(config: &ServerConfig) -> Result<Arc<ConfigService>, StartupError> {
    let durable = open_durable(config)?;
    let store = Arc::new(ConfigStore::open(durable)?);
    let current = store.current();

    tracing::info!(
        version = %current.version,
        colors = current.palette.colors.len(),
        "Palette store ready"
    );

    Ok(Arc::new(ConfigService::new(store, config.service_policy())))
}
