//! Server handles
//!
//! A [`Server`] is anything the application can start, stop and ask for an
//! advertised endpoint: an HTTP listener, an RPC server, a queue consumer.

pub mod http;

use crate::error::{LifecycleError, Result};
use async_trait::async_trait;

pub use http::HttpServer;

/// A long-running component driven by the application lifecycle
///
/// `start` and `stop` are called from different tasks and may overlap:
/// `stop` is invoked while `start` is still serving. Implementations own
/// whatever synchronization that requires.
///
/// # Example
///
/// ```rust,ignore
/// use maestro::transport::Server;
/// use maestro::Result;
/// use async_trait::async_trait;
///
/// #[async_trait]
/// impl Server for QueueConsumer {
///     async fn start(&self) -> Result<()> {
///         while let Some(msg) = self.next_message().await? {
///             self.handle(msg).await?;
///         }
///         Ok(())
///     }
///
///     async fn stop(&self) -> Result<()> {
///         self.close().await
///     }
/// }
/// ```
#[async_trait]
pub trait Server: Send + Sync {
    /// Run the server
    ///
    /// Resolves when the server terminates, either because `stop` was
    /// called or because it failed.
    async fn start(&self) -> Result<()>;

    /// Request graceful termination and wait for it to finish
    async fn stop(&self) -> Result<()>;

    /// Endpoint to advertise for discovery
    ///
    /// Best effort. An error means "nothing to advertise" and the server is
    /// left out of the instance's endpoint list.
    fn endpoint(&self) -> Result<String> {
        Err(LifecycleError::endpoint_unavailable(
            "server does not advertise an endpoint",
        ))
    }
}
