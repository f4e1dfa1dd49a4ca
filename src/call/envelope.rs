//! Module `envelope`
//!
//! Defines the routable unit that travels from a `ClientProxy` through the
//! transport to a session: destination, context data and payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::call::Fault;

/// Reserved context key carrying the caller's client identifier.
pub const CLIENT_ID_KEY: &str = "__ClientId";

/// Outcome of a call: the returned value or the fault that replaced it.
pub type CallResult = Result<Value, Fault>;

/// A single call travelling through the router.
///
/// `destination` doubles as the redirect marker: calls stamped by a
/// `ClientProxy` always carry one, direct calls to a registry endpoint do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub method: String,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    #[serde(default)]
    pub payload: Value,
}

impl CallEnvelope {
    /// Creates an unrouted call with empty context.
    pub fn new(method: impl Into<String>, payload: Value) -> Self {
        Self {
            destination: None,
            method: method.into(),
            context: HashMap::new(),
            payload,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Returns whether the call carries a destination redirect marker.
    pub fn is_routed(&self) -> bool {
        self.destination.is_some()
    }

    /// Returns the client identifier, if present as a non-empty string.
    pub fn client_id(&self) -> Option<&str> {
        self.context
            .get(CLIENT_ID_KEY)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn set_client_id(&mut self, client_id: &str) {
        self.context
            .insert(CLIENT_ID_KEY.to_string(), Value::String(client_id.to_string()));
    }
}
