//! Palette configuration server library.
//!
//! Writers publish a validated palette (colors plus timing); readers fetch the
//! current one or hang until it changes.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod palette;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use palette::{ConfigService, Palette, Version};
