//! Lifecycle Module
//!
//! Coordinates the servers of one service instance from startup to
//! graceful shutdown.
//!
//! # Run Sequence
//!
//! ```text
//! 1. Log instance identity (id, name, version)
//!    ↓
//! 2. Install signal source
//!    ↓
//! 3. Spawn per server: start-task, stop-task (waits for cancellation)
//!    ↓
//! 4. Register instance             ← failure cancels and joins servers
//!    ↓
//! 5. Spawn signal watcher
//!    ↓
//! [Running...]
//!    ↓
//! 6. Signal → stop(): deregister, fire cancellation token
//!    or server failure → fail-fast cancellation
//!    ↓
//! 7. Every stop-task calls Server::stop, every start-task returns
//!    ↓
//! 8. run() returns the first real failure, or Ok
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use maestro::lifecycle::{App, Signal};
//!
//! let app = App::builder()
//!     .name("billing")
//!     .server(http)
//!     .server(grpc)
//!     .signals([Signal::Terminate, Signal::Interrupt])
//!     .build();
//!
//! if let Err(e) = app.run().await {
//!     tracing::error!(error = %e, "application failed");
//!     std::process::exit(1);
//! }
//! ```

mod application;
mod group;
mod signal;

pub use application::{App, AppBuilder};
pub use group::TaskGroup;
pub use signal::{OsSignals, Signal, SignalSource};
