//! Read/write orchestration over the store and the wait coordinator.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::Value;
use thiserror::Error;

use crate::observability::metrics;
use crate::palette::coordinator::{WaitCoordinator, WaitKind, WaitOutcome};
use crate::palette::durable::StorageError;
use crate::palette::model::{Palette, Provenance, Snapshot, Version};
use crate::palette::rules::PaletteRules;
use crate::palette::store::ConfigStore;
use crate::palette::validator::{self, Rejection};

/// Default upper bound on a hanging read.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(25);

/// Settings that can change while the service runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePolicy {
    pub rules: PaletteRules,
    pub max_wait: Duration,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self {
            rules: PaletteRules::default(),
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// Errors surfaced to writers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("failed to persist palette: {0}")]
    Storage(#[from] StorageError),
}

/// A read request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadRequest {
    /// Version the caller last saw.
    pub baseline: Option<Version>,
    /// Block until the version moves past `baseline`, up to the wait bound.
    pub hang: bool,
}

/// Validates writes and serves reads.
pub struct ConfigService {
    store: Arc<ConfigStore>,
    coordinator: Arc<WaitCoordinator>,
    policy: ArcSwap<ServicePolicy>,
}

impl ConfigService {
    /// Wire a coordinator onto `store` and build the service.
    pub fn new(store: Arc<ConfigStore>, policy: ServicePolicy) -> Self {
        let coordinator = Arc::new(WaitCoordinator::new(store.current()));
        if !store.attach_listener(coordinator.clone()) {
            tracing::warn!(
                "Store already had a change listener; hanging reads will not wake on writes"
            );
        }

        Self {
            store,
            coordinator,
            policy: ArcSwap::from_pointee(policy),
        }
    }

    /// Serve a read, suspending only when `hang` is set and the baseline is
    /// current.
    pub async fn read(&self, request: ReadRequest) -> WaitOutcome {
        if !request.hang {
            return WaitOutcome {
                kind: WaitKind::Immediate,
                snapshot: self.coordinator.latest(),
            };
        }
        let max_wait = self.policy.load().max_wait;
        self.coordinator.wait(request.baseline, max_wait).await
    }

    /// Validate and install an already-parsed payload.
    pub fn write(
        &self,
        payload: &Value,
        provenance: Option<Provenance>,
    ) -> Result<Arc<Snapshot>, ServiceError> {
        let policy = self.policy.load();
        let validated = validator::validate(payload, &policy.rules);
        self.install(validated, provenance)
    }

    /// Validate and install a raw request body.
    pub fn write_bytes(
        &self,
        body: &[u8],
        provenance: Option<Provenance>,
    ) -> Result<Arc<Snapshot>, ServiceError> {
        let policy = self.policy.load();
        let validated = validator::validate_bytes(body, &policy.rules);
        self.install(validated, provenance)
    }

    fn install(
        &self,
        validated: Result<Palette, Rejection>,
        provenance: Option<Provenance>,
    ) -> Result<Arc<Snapshot>, ServiceError> {
        let palette = match validated {
            Ok(palette) => palette,
            Err(rejection) => {
                tracing::info!(reason = %rejection, "Palette write rejected");
                metrics::record_write("rejected");
                return Err(rejection.into());
            }
        };

        match self.store.replace(palette, provenance) {
            Ok(snapshot) => {
                tracing::info!(
                    version = %snapshot.version,
                    colors = snapshot.palette.colors.len(),
                    client = ?snapshot.provenance.as_ref().map(|p| p.client_id),
                    "Palette updated"
                );
                metrics::record_write("accepted");
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(error = %e, "Palette write failed to persist");
                metrics::record_write("storage_error");
                Err(e.into())
            }
        }
    }

    /// The current snapshot without waiting. Same source as [`Self::read`].
    pub fn current(&self) -> Arc<Snapshot> {
        self.coordinator.latest()
    }

    /// Rules currently applied to writes.
    pub fn rules(&self) -> PaletteRules {
        self.policy.load().rules.clone()
    }

    pub fn policy(&self) -> Arc<ServicePolicy> {
        self.policy.load_full()
    }

    /// Swap in new rules and wait bound.
    pub fn apply_policy(&self, policy: ServicePolicy) {
        tracing::info!(
            supported_colors = policy.rules.supported_colors.len(),
            max_wait_ms = policy.max_wait.as_millis() as u64,
            "Service policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    pub fn pending_waiters(&self) -> usize {
        self.coordinator.pending()
    }

    /// Answer every hanging read now and stop suspending new ones. Returns
    /// how many were released.
    pub fn close_waiters(&self) -> usize {
        self.coordinator.close()
    }
}
