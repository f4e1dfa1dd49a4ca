//! Module `counter`
//!
//! A small stateful service, one instance per client. Each client sees only
//! its own counter, which makes session isolation observable from outside.

use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::call::{CallEnvelope, CallResult, Fault};
use crate::error::ServiceError;
use crate::service::RemoteService;

pub struct CounterService {
    client_id: String,
    count: AtomicU64,
}

impl CounterService {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            count: AtomicU64::new(0),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteService for CounterService {
    async fn invoke(&self, call: CallEnvelope) -> CallResult {
        match call.method.as_str() {
            "echo" => Ok(call.payload),
            "whoami" => Ok(Value::String(self.client_id.clone())),
            "get" => Ok(json!(self.count())),
            "increment" => {
                let step = call.payload.as_u64().unwrap_or(1);
                let value = self.count.fetch_add(step, Ordering::SeqCst) + step;
                Ok(json!(value))
            }
            other => Err(Fault::unknown_method(other)),
        }
    }

    async fn dispose(&self) -> Result<(), ServiceError> {
        debug!(
            "Counter for {} disposed at {}",
            self.client_id,
            self.count()
        );
        Ok(())
    }
}
