//! Module `inproc`
//!
//! In-process channel: `inproc://<node>/<path>` dispatches straight into the
//! object directory registered under `<node>`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::call::{CallEnvelope, CallResult};
use crate::transport::address::Address;
use crate::transport::channel_registry::ChannelBinding;
use crate::transport::directory::{CallSink, ObjectDirectory};

pub const INPROC_SCHEME: &str = "inproc";

#[derive(Default)]
pub struct InProcBinding {
    nodes: RwLock<HashMap<String, Arc<ObjectDirectory>>>,
}

impl InProcBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `directory` reachable under its name.
    pub fn add_node(&self, directory: Arc<ObjectDirectory>) {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(directory.name().to_string(), directory);
    }
}

impl ChannelBinding for InProcBinding {
    fn scheme(&self) -> &str {
        INPROC_SCHEME
    }

    fn create_sink(&self, address: &Address) -> Option<Arc<dyn CallSink>> {
        let directory = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address.authority())
            .cloned()?;
        Some(Arc::new(InProcSink {
            directory,
            path: address.path().to_string(),
        }))
    }
}

struct InProcSink {
    directory: Arc<ObjectDirectory>,
    path: String,
}

#[async_trait]
impl CallSink for InProcSink {
    async fn process(&self, call: CallEnvelope) -> CallResult {
        self.directory.dispatch(&self.path, call).await
    }
}
