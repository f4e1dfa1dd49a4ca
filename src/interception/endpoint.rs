//! Module `endpoint`
//!
//! Terminal of a registry's chain: answers calls addressed to the registry
//! itself rather than to a client's service.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Weak;

use crate::call::{CallEnvelope, CallResult, Fault};
use crate::session::SessionResolver;
use crate::transport::CallSink;

pub const METHOD_PING: &str = "registry.ping";
pub const METHOD_SESSIONS: &str = "registry.sessions";
pub const METHOD_STATS: &str = "registry.stats";

pub struct RegistryEndpoint {
    resolver: Weak<dyn SessionResolver>,
}

impl RegistryEndpoint {
    pub fn new(resolver: Weak<dyn SessionResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl CallSink for RegistryEndpoint {
    async fn process(&self, call: CallEnvelope) -> CallResult {
        let Some(resolver) = self.resolver.upgrade() else {
            return Err(Fault::disposed("session registry"));
        };

        match call.method.as_str() {
            METHOD_PING => Ok(Value::String("pong".to_string())),
            METHOD_SESSIONS => Ok(json!(resolver.client_ids().await)),
            METHOD_STATS => serde_json::to_value(resolver.stats().await)
                .map_err(|e| Fault::service(e.to_string())),
            other => Err(Fault::unknown_method(other)),
        }
    }
}
