//! Module `bridge`
//!
//! A `ServerBridge` fronts one session's service. It registers the service
//! in the object directory once, remembers the assigned path, and routes
//! every call to that path.

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::call::{CallEnvelope, CallResult, Fault, FaultKind};
use crate::error::RoutingError;
use crate::service::ServiceRef;
use crate::transport::{CallSink, ObjectDirectory};

pub struct ServerBridge {
    client_id: String,
    address: String,
    directory: Arc<ObjectDirectory>,
    retired: AtomicBool,
}

impl ServerBridge {
    /// Registers `service` under `prefix` and records the assigned address.
    pub async fn register(
        directory: Arc<ObjectDirectory>,
        prefix: &str,
        client_id: &str,
        service: ServiceRef,
    ) -> Result<Self, RoutingError> {
        let address = directory
            .register(prefix, Arc::new(ServiceSink { service }))
            .await?;
        debug!("Bridge for {} registered at {}", client_id, address);

        Ok(Self {
            client_id: client_id.to_string(),
            address,
            directory,
            retired: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Rewrites the destination to the recorded address and dispatches the call.
    pub async fn invoke(&self, mut call: CallEnvelope) -> CallResult {
        if self.is_retired() {
            return Err(self.disposed_fault());
        }
        call.destination = Some(self.address.clone());

        match self.directory.dispatch(&self.address, call).await {
            // Only retirement removes the recorded address.
            Err(fault) if fault.kind == FaultKind::NoSuchObject => Err(self.disposed_fault()),
            other => other,
        }
    }

    /// Stops routing and removes the service from the directory. Idempotent.
    pub(crate) async fn retire(&self) {
        if !self.retired.swap(true, Ordering::SeqCst) {
            self.directory.unregister(&self.address).await;
        }
    }

    fn disposed_fault(&self) -> Fault {
        Fault::disposed(&format!("session {}", self.client_id))
    }
}

/// Adapts a service reference to the directory's sink interface.
struct ServiceSink {
    service: ServiceRef,
}

#[async_trait]
impl CallSink for ServiceSink {
    async fn process(&self, call: CallEnvelope) -> CallResult {
        self.service.invoke(call).await
    }
}
