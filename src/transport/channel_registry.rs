//! Module `channel_registry`
//!
//! Provides the client-side registry of transport channel bindings. A
//! binding knows one scheme and can turn an address of that scheme into a
//! sink; proxies consult the registry once, when they are built.

use log::debug;
use std::sync::Arc;

use crate::transport::address::Address;
use crate::transport::directory::CallSink;
use crate::transport::inproc::InProcBinding;
use crate::transport::tcp::TcpBinding;
use crate::transport::wire::DEFAULT_MAX_FRAME_LENGTH;

/// Resolves addresses of one scheme to call sinks.
pub trait ChannelBinding: Send + Sync {
    fn scheme(&self) -> &str;

    /// Returns a sink for `address`, or `None` if this binding cannot reach it.
    fn create_sink(&self, address: &Address) -> Option<Arc<dyn CallSink>>;
}

/// Ordered set of channel bindings; earlier registrations win.
#[derive(Default)]
pub struct ChannelRegistry {
    bindings: Vec<Arc<dyn ChannelBinding>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled `inproc` and `tcp` channels.
    pub fn with_defaults(inproc: Arc<InProcBinding>) -> Self {
        Self::with_max_frame_length(inproc, DEFAULT_MAX_FRAME_LENGTH)
    }

    /// Same as `with_defaults`, with a cap on replies read over `tcp`.
    pub fn with_max_frame_length(inproc: Arc<InProcBinding>, max_frame_length: usize) -> Self {
        let mut registry = Self::new();
        registry.register(inproc);
        registry.register(Arc::new(TcpBinding::with_max_frame_length(max_frame_length)));
        registry
    }

    pub fn register(&mut self, binding: Arc<dyn ChannelBinding>) {
        debug!("Channel binding registered for scheme {}", binding.scheme());
        self.bindings.push(binding);
    }

    /// Scans bindings with a matching scheme for one that can reach `address`.
    pub fn resolve(&self, address: &Address) -> Option<Arc<dyn CallSink>> {
        self.bindings
            .iter()
            .filter(|binding| binding.scheme().eq_ignore_ascii_case(address.scheme()))
            .find_map(|binding| binding.create_sink(address))
    }

    pub fn schemes(&self) -> Vec<&str> {
        self.bindings.iter().map(|binding| binding.scheme()).collect()
    }
}
