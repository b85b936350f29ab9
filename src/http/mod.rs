//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, baseline, provenance)
//!     → handlers.rs (read / write / limits / status)
//!     → palette::service
//!     → response.rs (JSON body, version headers, error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{X_CONFIG_VERSION, X_REQUEST_ID};
pub use response::X_WAIT_OUTCOME;
pub use server::{AppState, HttpServer};
