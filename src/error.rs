//! Lifecycle error types

use thiserror::Error;

/// Errors that can occur while running or stopping an application
///
/// Every variant carries plain strings so a failure returned from
/// [`App::run`](crate::App::run) can be compared with the one a server
/// or registry originally produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// A server failed to start, serve or stop
    #[error("Server {server} failed: {message}")]
    ServerFailed {
        /// Name of the server that failed
        server: String,
        /// Error message
        message: String,
    },

    /// A server has no endpoint to advertise
    #[error("Endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    /// Registering the service instance failed
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    /// Deregistering the service instance failed
    #[error("Deregistration failed: {0}")]
    DeregistrationFailed(String),

    /// Installing an OS signal handler failed
    #[error("Signal handling failed: {0}")]
    Signal(String),

    /// Invalid settings
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// `run` was called on an application that already ran
    #[error("Application already started")]
    AlreadyStarted,

    /// The task exited because the shared cancellation token fired
    #[error("Canceled")]
    Canceled,

    /// Anything else, including panics inside joined tasks
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    /// Create a server failure error
    pub fn server_failed(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServerFailed {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create an endpoint unavailable error
    pub fn endpoint_unavailable(msg: impl Into<String>) -> Self {
        Self::EndpointUnavailable(msg.into())
    }

    /// Create a registration failure error
    pub fn registration_failed(msg: impl Into<String>) -> Self {
        Self::RegistrationFailed(msg.into())
    }

    /// Create a deregistration failure error
    pub fn deregistration_failed(msg: impl Into<String>) -> Self {
        Self::DeregistrationFailed(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this is the expected outcome of a fired cancellation token
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<anyhow::Error> for LifecycleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_canceled_is_canceled() {
        assert!(LifecycleError::Canceled.is_canceled());
        assert!(!LifecycleError::internal("boom").is_canceled());
        assert!(!LifecycleError::server_failed("http", "boom").is_canceled());
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err = anyhow::anyhow!("connection refused").context("dialing registry");
        let converted: LifecycleError = err.into();
        assert_eq!(
            converted,
            LifecycleError::internal("dialing registry: connection refused")
        );
    }

    #[test]
    fn test_display() {
        let err = LifecycleError::server_failed("grpc", "address in use");
        assert_eq!(err.to_string(), "Server grpc failed: address in use");
    }
}
