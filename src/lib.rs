//! # Maestro
//!
//! Lifecycle coordination for networked service instances.
//!
//! Maestro starts any number of servers concurrently, publishes the
//! instance to a service registry, and shuts everything down together when
//! a termination signal arrives or any server fails.
//!
//! ## Features
//!
//! - **Concurrent servers**: every [`Server`](transport::Server) runs in its own task
//! - **Fail-fast shutdown**: the first failing server stops all the others
//! - **Service registration**: register on start, deregister on stop
//! - **Signal handling**: SIGTERM, SIGQUIT and SIGINT by default, or any injected source
//! - **Reusable primitive**: [`TaskGroup`] is usable on its own
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use maestro::App;
//! use maestro::transport::HttpServer;
//!
//! #[tokio::main]
//! async fn main() -> maestro::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let router = Router::new().route("/health", get(|| async { "ok" }));
//!     let http = HttpServer::bind("0.0.0.0:8000", router).await?;
//!
//!     let app = App::builder()
//!         .name("billing")
//!         .version("v1.0.0")
//!         .server(http)
//!         .build();
//!
//!     app.run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod transport;

// Re-export core types
pub use config::Settings;
pub use error::{LifecycleError, Result};
pub use lifecycle::{App, AppBuilder, Signal, SignalSource, TaskGroup};
pub use registry::{Registry, ServiceInstance};
pub use transport::Server;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// ```
/// use maestro::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{LifecycleError, Result};
    pub use crate::lifecycle::{App, AppBuilder, OsSignals, Signal, SignalSource, TaskGroup};
    pub use crate::registry::{Registry, ServiceInstance};
    pub use crate::transport::{HttpServer, Server};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
