//! Isolation boundaries
//!
//! An isolation boundary is the execution context a client's service lives
//! in. The registry only relies on `create`, `instantiate` and `teardown`;
//! whether a boundary is a task, a process or a plain namespace is up to the
//! implementation.

pub mod logical;
pub mod task;

use async_trait::async_trait;

use crate::error::BoundaryError;
use crate::service::{ServiceFactory, ServiceRef};

pub use logical::LogicalBoundary;
pub use task::TaskBoundary;

/// Exclusive handle to one created boundary.
///
/// Not `Clone`: teardown consumes the handle, so a boundary cannot be torn
/// down twice through the same session.
#[derive(Debug, PartialEq, Eq)]
pub struct BoundaryHandle {
    id: u64,
    client_id: String,
}

impl BoundaryHandle {
    pub fn new(id: u64, client_id: &str) -> Self {
        Self {
            id,
            client_id: client_id.to_string(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
pub trait IsolationBoundary: Send + Sync {
    /// Short name used in log lines.
    fn kind(&self) -> &'static str;

    /// Creates an empty execution context for `client_id`.
    async fn create(&self, client_id: &str) -> Result<BoundaryHandle, BoundaryError>;

    /// Runs `factory` for the handle's client inside the boundary.
    async fn instantiate(
        &self,
        handle: &BoundaryHandle,
        factory: &ServiceFactory,
    ) -> Result<ServiceRef, BoundaryError>;

    /// Destroys the context. Services instantiated in it must not be used afterwards.
    async fn teardown(&self, handle: BoundaryHandle) -> Result<(), BoundaryError>;
}
