//! Hosted services
//!
//! A `RemoteService` is the opaque object a session hosts inside its
//! isolation boundary. The registry never knows its concrete type; it only
//! holds the factory that builds one per client.

pub mod counter;

use async_trait::async_trait;
use std::sync::Arc;

use crate::call::{CallEnvelope, CallResult};
use crate::error::ServiceError;

pub use counter::CounterService;

#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Handles one call addressed to this service.
    async fn invoke(&self, call: CallEnvelope) -> CallResult;

    /// Releases the service's resources. Called once, before its boundary is torn down.
    async fn dispose(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Shared reference to a live service instance.
pub type ServiceRef = Arc<dyn RemoteService>;

/// Builds the service for a client id.
pub type ServiceFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn RemoteService>, ServiceError> + Send + Sync>;

/// Wraps a closure returning a concrete service into a `ServiceFactory`.
pub fn service_factory<F, S>(build: F) -> ServiceFactory
where
    F: Fn(&str) -> Result<S, ServiceError> + Send + Sync + 'static,
    S: RemoteService + 'static,
{
    Arc::new(move |client_id| {
        build(client_id).map(|service| Box::new(service) as Box<dyn RemoteService>)
    })
}
