//! Module `directory`
//!
//! The object directory is the server side of the transport: it maps object
//! paths to the sinks that handle calls for them. Registries register their
//! interception chain here; bridges register the services they front.

use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::call::{CallEnvelope, CallResult, Fault};
use crate::error::TransportError;
use crate::transport::address::normalize_path;

/// Anything that can process a call synchronously from the caller's view.
#[async_trait]
pub trait CallSink: Send + Sync {
    async fn process(&self, call: CallEnvelope) -> CallResult;
}

pub struct ObjectDirectory {
    name: String,
    objects: RwLock<HashMap<String, Arc<dyn CallSink>>>,
}

impl ObjectDirectory {
    /// Creates an empty directory. `name` is the node name in `inproc://` addresses.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `sink` at a fixed path.
    pub async fn register_at(
        &self,
        path: &str,
        sink: Arc<dyn CallSink>,
    ) -> Result<String, TransportError> {
        let path = normalize_path(path);
        let mut objects = self.objects.write().await;
        if objects.contains_key(&path) {
            return Err(TransportError::PathInUse(path));
        }
        objects.insert(path.clone(), sink);
        debug!("Directory {} registered {}", self.name, path);
        Ok(path)
    }

    /// Registers `sink` under `prefix` with a freshly assigned unique path.
    pub async fn register(
        &self,
        prefix: &str,
        sink: Arc<dyn CallSink>,
    ) -> Result<String, TransportError> {
        let path = format!(
            "{}/{}",
            normalize_path(prefix).trim_end_matches('/'),
            Uuid::new_v4().simple()
        );
        self.register_at(&path, sink).await
    }

    pub async fn unregister(&self, path: &str) -> bool {
        let removed = self
            .objects
            .write()
            .await
            .remove(&normalize_path(path))
            .is_some();
        if removed {
            debug!("Directory {} unregistered {}", self.name, path);
        }
        removed
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&normalize_path(path))
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Delivers `call` to the sink registered at `path`.
    pub async fn dispatch(&self, path: &str, call: CallEnvelope) -> CallResult {
        let path = normalize_path(path);
        let sink = self.objects.read().await.get(&path).cloned();
        match sink {
            Some(sink) => sink.process(call).await,
            None => Err(Fault::no_such_object(&path)),
        }
    }
}
