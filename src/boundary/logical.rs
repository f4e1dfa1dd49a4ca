//! Module `logical`
//!
//! A boundary that is only a namespace: services run in-process on the
//! caller's task, and the boundary just tracks which handles are live.

use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::boundary::{BoundaryHandle, IsolationBoundary};
use crate::error::BoundaryError;
use crate::service::{ServiceFactory, ServiceRef};

#[derive(Default)]
pub struct LogicalBoundary {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl LogicalBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles created and not yet torn down.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn is_live(&self, id: u64) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

#[async_trait]
impl IsolationBoundary for LogicalBoundary {
    fn kind(&self) -> &'static str {
        "logical"
    }

    async fn create(&self, client_id: &str) -> Result<BoundaryHandle, BoundaryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        debug!("Logical boundary {} created for {}", id, client_id);
        Ok(BoundaryHandle::new(id, client_id))
    }

    async fn instantiate(
        &self,
        handle: &BoundaryHandle,
        factory: &ServiceFactory,
    ) -> Result<ServiceRef, BoundaryError> {
        if !self.is_live(handle.id()) {
            return Err(BoundaryError::UnknownHandle(handle.id()));
        }
        let service = factory(handle.client_id())
            .map_err(|e| BoundaryError::InstantiateFailed(e.to_string()))?;
        Ok(Arc::from(service))
    }

    async fn teardown(&self, handle: BoundaryHandle) -> Result<(), BoundaryError> {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());
        if removed {
            debug!("Logical boundary {} torn down", handle.id());
            Ok(())
        } else {
            Err(BoundaryError::UnknownHandle(handle.id()))
        }
    }
}
