//! Module `identity`
//!
//! The routing stage. Routed calls must name their client; the stage finds
//! (or creates) that client's session and forwards the call to its bridge.
//! Unrouted calls continue down the chain untouched.

use async_trait::async_trait;
use log::warn;
use std::sync::Weak;

use crate::call::{CallEnvelope, CallResult, Fault};
use crate::error::RoutingError;
use crate::interception::chain::{CallStage, Next};
use crate::session::SessionResolver;

pub struct IdentityRoutingStage {
    resolver: Weak<dyn SessionResolver>,
}

impl IdentityRoutingStage {
    pub fn new(resolver: Weak<dyn SessionResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl CallStage for IdentityRoutingStage {
    fn name(&self) -> &'static str {
        "identity-routing"
    }

    async fn process(&self, call: CallEnvelope, next: Next<'_>) -> CallResult {
        if !call.is_routed() {
            return next.run(call).await;
        }

        let Some(client_id) = call.client_id().map(str::to_owned) else {
            warn!(
                "Rejected routed call {} to {:?}: no client identity",
                call.method, call.destination
            );
            return Err(Fault::from(RoutingError::MissingClientIdentity));
        };

        let Some(resolver) = self.resolver.upgrade() else {
            return Err(Fault::disposed("session registry"));
        };

        let bridge = resolver.resolve_bridge(&client_id).await?;
        bridge.invoke(call).await
    }
}
