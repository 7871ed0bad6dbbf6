//! HTTP server adapter over an axum [`Router`]

use super::Server;
use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Serves an axum router until stopped
///
/// The listener is bound when the server is created, so [`endpoint`]
/// reports the real address (including an OS-assigned port) before the
/// application starts.
///
/// # Example
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use maestro::transport::HttpServer;
///
/// # async fn demo() -> maestro::Result<()> {
/// let router = Router::new().route("/health", get(|| async { "ok" }));
/// let server = HttpServer::bind("0.0.0.0:8000", router).await?;
/// println!("advertising {}", server.local_addr());
/// # Ok(())
/// # }
/// ```
///
/// [`endpoint`]: Server::endpoint
pub struct HttpServer {
    name: String,
    local_addr: SocketAddr,
    pending: Mutex<Option<(TcpListener, Router)>>,
    shutdown: CancellationToken,
    done: CancellationToken,
}

impl HttpServer {
    /// Bind a listener for `router`
    pub async fn bind(addr: impl ToSocketAddrs, router: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LifecycleError::server_failed("http", e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| LifecycleError::server_failed("http", e.to_string()))?;

        Ok(Self {
            name: "http".to_string(),
            local_addr,
            pending: Mutex::new(Some((listener, router))),
            shutdown: CancellationToken::new(),
            done: CancellationToken::new(),
        })
    }

    /// Name used in logs and errors
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Server for HttpServer {
    async fn start(&self) -> Result<()> {
        let Some((listener, router)) = self.pending.lock().await.take() else {
            return Err(LifecycleError::server_failed(&self.name, "already started"));
        };
        let _done = self.done.clone().drop_guard();

        tracing::info!(server = %self.name, addr = %self.local_addr, "HTTP server listening");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| LifecycleError::server_failed(&self.name, e.to_string()))?;

        tracing::info!(server = %self.name, "HTTP server stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();

        // Never started: `start` will observe the fired token and return at once.
        if self.pending.lock().await.is_some() {
            return Ok(());
        }
        self.done.cancelled().await;
        Ok(())
    }

    fn endpoint(&self) -> Result<String> {
        Ok(format!("http://{}", self.local_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    async fn get_health(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_endpoint_reports_bound_port() {
        let server = HttpServer::bind("127.0.0.1:0", Router::new()).await.unwrap();
        let endpoint = server.endpoint().unwrap();

        assert_eq!(endpoint, format!("http://{}", server.local_addr()));
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_serves_until_stopped() {
        let router = Router::new().route("/health", get(|| async { "ok" }));
        let server = Arc::new(HttpServer::bind("127.0.0.1:0", router).await.unwrap());
        let addr = server.local_addr();

        let serving = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.start().await }
        });

        let response = get_health(addr).await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));

        timeout(Duration::from_secs(5), server.stop())
            .await
            .unwrap()
            .unwrap();
        let result = timeout(Duration::from_secs(5), serving).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let server = HttpServer::bind("127.0.0.1:0", Router::new()).await.unwrap();

        server.stop().await.unwrap();
        timeout(Duration::from_secs(5), server.start())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_start_fails() {
        let server = HttpServer::bind("127.0.0.1:0", Router::new())
            .await
            .unwrap()
            .with_name("admin");
        server.stop().await.unwrap();
        server.start().await.unwrap();

        let err = server.start().await.unwrap_err();
        assert_eq!(err, LifecycleError::server_failed("admin", "already started"));
    }
}
