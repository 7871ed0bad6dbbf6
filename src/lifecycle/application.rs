//! Application lifecycle
//!
//! [`App`] starts every configured server concurrently, registers the
//! service instance, waits for a termination signal or a server failure,
//! and then shuts everything down.

use super::group::TaskGroup;
use super::signal::{OsSignals, Signal, SignalSource};
use crate::config::Settings;
use crate::error::{LifecycleError, Result};
use crate::registry::{Registry, ServiceInstance};
use crate::transport::Server;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};
use uuid::Uuid;

/// Where `run` gets its signals from
enum SignalConfig {
    Os(Vec<Signal>),
    Source(Box<dyn SignalSource>),
}

struct Inner {
    instance: ServiceInstance,
    servers: Vec<Arc<dyn Server>>,
    registry: Option<Arc<dyn Registry>>,
    // Serializes register/deregister; true while the instance is registered.
    registry_calls: Mutex<bool>,
    signals: Mutex<Option<SignalConfig>>,
    token: CancellationToken,
    span: Span,
    started: AtomicBool,
}

/// Lifecycle coordinator for one service instance
///
/// Cheap to clone; clones share the same state, so one clone can be moved
/// into a task that calls [`App::stop`] while another is inside
/// [`App::run`].
///
/// An `App` runs once. `run` installs OS signal handlers, so only one `App`
/// should be running per process unless each one is given its own
/// [`SignalSource`]. Tokio never uninstalls a signal handler: after `run`
/// returns, the configured signals stay caught and are ignored instead of
/// terminating the process.
///
/// # Example
///
/// ```rust,ignore
/// use maestro::App;
/// use maestro::transport::HttpServer;
///
/// #[tokio::main]
/// async fn main() -> maestro::Result<()> {
///     let http = HttpServer::bind("0.0.0.0:8000", router).await?;
///
///     let app = App::builder()
///         .name("billing")
///         .version("v1.4.2")
///         .metadata("zone", "eu-1")
///         .server(http)
///         .registry(consul)
///         .build();
///
///     app.run().await
/// }
/// ```
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

impl App {
    /// Create a new application builder
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// The advertised service instance
    pub fn instance(&self) -> &ServiceInstance {
        &self.inner.instance
    }

    pub fn servers(&self) -> &[Arc<dyn Server>] {
        &self.inner.servers
    }

    pub fn registry(&self) -> Option<&Arc<dyn Registry>> {
        self.inner.registry.as_ref()
    }

    /// Span every lifecycle log line is emitted in
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// The application's cancellation token
    ///
    /// Fires once shutdown has been requested.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Whether shutdown has been requested
    pub fn is_stopped(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Run the application until it is stopped or a server fails
    ///
    /// Resolves only after every server's `start` has returned. Returns the
    /// first server failure, or the registration failure if the instance
    /// could not be registered. A second call returns
    /// [`LifecycleError::AlreadyStarted`].
    pub async fn run(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::AlreadyStarted);
        }
        self.run_servers().instrument(self.inner.span.clone()).await
    }

    async fn run_servers(&self) -> Result<()> {
        let instance = &self.inner.instance;
        tracing::info!(
            service_id = %instance.id,
            service_name = %instance.name,
            version = %instance.version,
            "starting application"
        );

        let signals = self.take_signal_source().await?;
        let span = Span::current();
        let mut group = TaskGroup::with_parent(&self.inner.token);

        for server in &self.inner.servers {
            let token = group.token();
            let srv = Arc::clone(server);
            group.spawn(
                async move {
                    token.cancelled().await;
                    srv.stop().await
                }
                .instrument(span.clone()),
            );

            let srv = Arc::clone(server);
            group.spawn(async move { srv.start().await }.instrument(span.clone()));
        }

        if let Some(registry) = &self.inner.registry {
            let registered = {
                let mut registered = self.inner.registry_calls.lock().await;
                if self.inner.token.is_cancelled() {
                    tracing::info!(
                        service_id = %instance.id,
                        "shutdown requested before registration, skipping it"
                    );
                    Ok(())
                } else {
                    let result = registry.register(instance).await;
                    *registered = result.is_ok();
                    result
                }
            };
            if let Err(err) = registered {
                tracing::error!(
                    error = %err,
                    service_id = %instance.id,
                    "service registration failed, stopping servers"
                );
                self.inner.token.cancel();
                if let Err(server_err) = group.wait().await {
                    tracing::warn!(error = %server_err, "server failed while stopping");
                }
                return Err(err);
            }
            if !self.inner.token.is_cancelled() {
                tracing::info!(service_id = %instance.id, "service registered");
            }
        }

        let app = self.clone();
        let token = group.token();
        group.spawn(async move { app.watch_signals(signals, token).await }.instrument(span));

        let result = group.wait().await;
        self.deregister_leftover().await;
        match &result {
            Ok(()) => tracing::info!(service_id = %instance.id, "application stopped"),
            Err(err) => tracing::error!(
                error = %err,
                service_id = %instance.id,
                "application stopped with error"
            ),
        }
        result
    }

    /// Gracefully stop the application
    ///
    /// Deregisters the instance, then fires the cancellation token, which
    /// makes `run` stop every server. The token fires even when
    /// deregistration fails, so shutdown never depends on the registry; the
    /// deregistration error is still returned. Calling `stop` again is
    /// harmless.
    pub async fn stop(&self) -> Result<()> {
        self.deregister_and_cancel()
            .instrument(self.inner.span.clone())
            .await
    }

    async fn deregister_and_cancel(&self) -> Result<()> {
        let instance = &self.inner.instance;
        let result = match &self.inner.registry {
            Some(registry) => {
                let mut registered = self.inner.registry_calls.lock().await;
                *registered = false;
                registry.deregister(instance).await
            }
            None => Ok(()),
        };

        if let Err(err) = &result {
            tracing::error!(
                error = %err,
                service_id = %instance.id,
                "service deregistration failed, shutting down anyway"
            );
        }

        if !self.inner.token.is_cancelled() {
            tracing::info!(service_id = %instance.id, "stopping application");
        }
        self.inner.token.cancel();
        result
    }

    /// Deregister an instance that is still registered once every server
    /// has returned, e.g. when shutdown came from a parent token or a
    /// server failure rather than from `stop`
    async fn deregister_leftover(&self) {
        let Some(registry) = &self.inner.registry else {
            return;
        };
        let mut registered = self.inner.registry_calls.lock().await;
        if !*registered {
            return;
        }
        *registered = false;

        let instance = &self.inner.instance;
        if let Err(err) = registry.deregister(instance).await {
            tracing::error!(
                error = %err,
                service_id = %instance.id,
                "service deregistration failed after shutdown"
            );
        }
    }

    async fn take_signal_source(&self) -> Result<Box<dyn SignalSource>> {
        // Only the first `run` gets here; the `started` guard stops the rest.
        let config = self
            .inner
            .signals
            .lock()
            .await
            .take()
            .unwrap_or(SignalConfig::Os(Vec::new()));

        match config {
            SignalConfig::Source(source) => Ok(source),
            SignalConfig::Os(signals) => Ok(Box::new(OsSignals::install(&signals)?)),
        }
    }

    async fn watch_signals(
        &self,
        mut signals: Box<dyn SignalSource>,
        token: CancellationToken,
    ) -> Result<()> {
        let mut open = true;
        loop {
            tokio::select! {
                _ = token.cancelled() => return Err(LifecycleError::Canceled),
                received = signals.recv(), if open => match received {
                    Some(signal) => {
                        tracing::info!(%signal, "received signal");
                        if let Err(err) = self.stop().await {
                            tracing::warn!(error = %err, %signal, "stop triggered by signal reported an error");
                        }
                    }
                    None => {
                        tracing::debug!("signal source closed");
                        open = false;
                    }
                },
            }
        }
    }
}

/// Builder for [`App`]
pub struct AppBuilder {
    id: Option<String>,
    name: String,
    version: String,
    metadata: HashMap<String, String>,
    endpoints: Vec<String>,
    servers: Vec<Arc<dyn Server>>,
    registry: Option<Arc<dyn Registry>>,
    signals: Vec<Signal>,
    signal_source: Option<Box<dyn SignalSource>>,
    parent: Option<CancellationToken>,
    span: Option<Span>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    /// Create a new application builder
    pub fn new() -> Self {
        Self {
            id: None,
            name: String::new(),
            version: String::new(),
            metadata: HashMap::new(),
            endpoints: Vec::new(),
            servers: Vec::new(),
            registry: None,
            signals: Signal::DEFAULT_SET.to_vec(),
            signal_source: None,
            parent: None,
            span: None,
        }
    }

    /// Override the generated instance id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add one metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Advertise `endpoint` instead of asking the servers
    ///
    /// Once any endpoint is set explicitly, server endpoints are ignored.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Add a server
    pub fn server<S>(self, server: S) -> Self
    where
        S: Server + 'static,
    {
        self.shared_server(Arc::new(server))
    }

    /// Add a server the caller keeps a handle to
    pub fn shared_server(mut self, server: Arc<dyn Server>) -> Self {
        self.servers.push(server);
        self
    }

    /// Set the registry the instance is published to
    pub fn registry<R>(self, registry: R) -> Self
    where
        R: Registry + 'static,
    {
        self.shared_registry(Arc::new(registry))
    }

    pub fn shared_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// OS signals that trigger shutdown
    ///
    /// Defaults to [`Signal::DEFAULT_SET`]. An empty set disables OS signal
    /// handling.
    pub fn signals(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.signals = signals.into_iter().collect();
        self
    }

    /// Read signals from `source` instead of installing OS handlers
    pub fn signal_source(mut self, source: impl SignalSource) -> Self {
        self.signal_source = Some(Box::new(source));
        self
    }

    /// Cancelling `parent` stops the application
    pub fn parent_token(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Span lifecycle logs are emitted in (default: `app`)
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Apply operator settings on top of what is already configured
    pub fn settings(mut self, settings: Settings) -> Self {
        if let Some(id) = settings.id {
            self.id = Some(id);
        }
        if let Some(name) = settings.name {
            self.name = name;
        }
        if let Some(version) = settings.version {
            self.version = version;
        }
        self.metadata.extend(settings.metadata);
        self.endpoints.extend(settings.endpoints);
        if let Some(signals) = settings.signals {
            self.signals = signals;
        }
        self
    }

    /// Build the application
    ///
    /// Without explicit endpoints, every server is asked for its endpoint
    /// in the order the servers were added; servers that have none are
    /// left out.
    pub fn build(self) -> App {
        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let endpoints = if self.endpoints.is_empty() {
            self.servers
                .iter()
                .filter_map(|server| match server.endpoint() {
                    Ok(endpoint) => Some(endpoint),
                    Err(err) => {
                        tracing::debug!(error = %err, "server has no endpoint to advertise");
                        None
                    }
                })
                .collect()
        } else {
            self.endpoints
        };

        let instance = ServiceInstance {
            id,
            name: self.name,
            version: self.version,
            metadata: self.metadata,
            endpoints,
        };

        let signals = match self.signal_source {
            Some(source) => SignalConfig::Source(source),
            None => SignalConfig::Os(self.signals),
        };

        let token = match self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        App {
            inner: Arc::new(Inner {
                instance,
                servers: self.servers,
                registry: self.registry,
                registry_calls: Mutex::new(false),
                signals: Mutex::new(Some(signals)),
                token,
                span: self.span.unwrap_or_else(|| tracing::info_span!("app")),
                started: AtomicBool::new(false),
            }),
        }
    }
}
