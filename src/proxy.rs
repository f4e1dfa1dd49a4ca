//! Module `proxy`
//!
//! Client-side stub. A `ClientProxy` resolves its channel once, when it is
//! built, then tags every call with the caller's client id and the target
//! address before forwarding it.

use log::debug;
use serde_json::Value;
use std::sync::Arc;

use crate::call::{CallEnvelope, CallResult};
use crate::error::RoutingError;
use crate::transport::{Address, CallSink, ChannelRegistry};
use crate::utils::validation::validate_client_id;

pub struct ClientProxy {
    target_address: String,
    client_id: String,
    sink: Arc<dyn CallSink>,
}

impl ClientProxy {
    pub fn new(
        target_address: &str,
        client_id: &str,
        channels: &ChannelRegistry,
    ) -> Result<Self, RoutingError> {
        if target_address.trim().is_empty() {
            return Err(RoutingError::InvalidArgument(
                "target address must not be empty".into(),
            ));
        }
        validate_client_id(client_id)?;

        let address = Address::parse(target_address)?;
        let sink = channels
            .resolve(&address)
            .ok_or_else(|| RoutingError::NoChannelFound(address.to_string()))?;
        debug!("Proxy for {} bound to {}", client_id, address);

        Ok(Self {
            target_address: target_address.trim().to_string(),
            client_id: client_id.to_string(),
            sink,
        })
    }

    pub fn target_address(&self) -> &str {
        &self.target_address
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Stamps destination and client id, then forwards through the channel.
    pub async fn invoke(&self, mut call: CallEnvelope) -> CallResult {
        call.destination = Some(self.target_address.clone());
        call.set_client_id(&self.client_id);
        self.sink.process(call).await
    }

    pub async fn call(&self, method: &str, payload: Value) -> CallResult {
        self.invoke(CallEnvelope::new(method, payload)).await
    }
}
