//! Service registration
//!
//! The [`ServiceInstance`] record is what an application advertises to a
//! discovery facility, and [`Registry`] is the capability used to publish
//! and withdraw it. Concrete backends live outside this crate.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity of one running service instance
///
/// Built once per [`App`](crate::App) and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Unique per process run
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Endpoint URLs, e.g. `http://10.0.0.1:8000`
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// Publishes a service instance to a discovery facility
///
/// The application serializes calls, so an implementation never sees two
/// outstanding register/deregister calls at once. Failures are not retried.
///
/// # Example
///
/// ```rust,ignore
/// use maestro::registry::{Registry, ServiceInstance};
/// use maestro::{LifecycleError, Result};
/// use async_trait::async_trait;
///
/// #[async_trait]
/// impl Registry for EtcdRegistry {
///     async fn register(&self, instance: &ServiceInstance) -> Result<()> {
///         self.client.put(&instance.id, instance).await
///             .map_err(|e| LifecycleError::registration_failed(e.to_string()))
///     }
///
///     async fn deregister(&self, instance: &ServiceInstance) -> Result<()> {
///         self.client.delete(&instance.id).await
///             .map_err(|e| LifecycleError::deregistration_failed(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait Registry: Send + Sync {
    /// Make the instance discoverable
    async fn register(&self, instance: &ServiceInstance) -> Result<()>;

    /// Remove the instance from discovery
    async fn deregister(&self, instance: &ServiceInstance) -> Result<()>;
}
