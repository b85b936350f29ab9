//! Palette configuration core.
//!
//! # Data Flow
//! ```text
//! write: body → validator.rs → store.rs (persist via durable.rs, publish)
//!                                  → coordinator.rs wakes waiters
//! read:  store.rs (no hang) | coordinator.rs (hang, bounded wait)
//! ```
//!
//! service.rs ties the pieces together; nothing here knows about HTTP.

pub mod coordinator;
pub mod durable;
pub mod model;
pub mod rules;
pub mod service;
pub mod store;
pub mod validator;

pub use coordinator::{WaitCoordinator, WaitKind, WaitOutcome};
pub use durable::{DurableStore, JsonFileStore, MemoryStore, StorageError};
pub use model::{Palette, Provenance, Snapshot, Version};
pub use rules::PaletteRules;
pub use service::{ConfigService, ReadRequest, ServiceError, ServicePolicy};
pub use store::{ChangeListener, ConfigStore};
pub use validator::{Malformed, Rejection};
