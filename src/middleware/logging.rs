//! Logging middleware
//!
//! Records every call that reaches a registry, and how it ended.

use async_trait::async_trait;
use log::{debug, info};

use crate::call::{CallEnvelope, CallResult};
use crate::interception::{CallStage, Next};

/// Log a call arriving at a registry
pub fn log_call(registry: &str, client_id: &str, method: &str) {
    debug!("{}: client {} called {}", registry, client_id, method);
}

/// Log a call that ended in a fault
pub fn log_fault(registry: &str, client_id: &str, method: &str, fault: &str) {
    info!(
        "{}: call {} from client {} faulted: {}",
        registry, method, client_id, fault
    );
}

pub struct LoggingStage {
    registry: String,
}

impl LoggingStage {
    pub fn new(registry: &str) -> Self {
        Self {
            registry: registry.to_string(),
        }
    }
}

#[async_trait]
impl CallStage for LoggingStage {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn process(&self, call: CallEnvelope, next: Next<'_>) -> CallResult {
        let client_id = call.client_id().unwrap_or("<direct>").to_string();
        let method = call.method.clone();
        log_call(&self.registry, &client_id, &method);

        let result = next.run(call).await;
        if let Err(fault) = &result {
            log_fault(&self.registry, &client_id, &method, &fault.to_string());
        }
        result
    }
}
