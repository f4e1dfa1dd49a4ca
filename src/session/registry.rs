//! Session registry
//!
//! Owns the mapping from client id to `ClientSession`, creates sessions on
//! first use and evicts them once idle.
//!
//! Every change to the map happens under one async mutex, including session
//! construction. No two sessions ever exist for the same id and a disposal
//! can never miss a session that is still being built. Teardown is split:
//! a session is removed and detached under the lock, then released after
//! the lock is dropped, because releasing waits for calls still running
//! inside its boundary and those calls may reach back into the registry.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::boundary::{IsolationBoundary, LogicalBoundary};
use crate::bridge::ServerBridge;
use crate::error::RoutingError;
use crate::interception::{IdentityRoutingStage, InterceptionChain, RegistryEndpoint};
use crate::middleware::logging::LoggingStage;
use crate::middleware::rate_limit::{RateLimit, RateLimitStage};
use crate::service::ServiceFactory;
use crate::session::client_session::ClientSession;
use crate::session::eviction::{EvictionOutcome, is_same_session, spawn_idle_eviction};
use crate::session::state::IdleTimeout;
use crate::transport::ObjectDirectory;
use crate::transport::address::normalize_path;
use crate::utils::validation::{validate_client_id, validate_registry_address};

/// Counters exposed through `registry.stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub live_sessions: usize,
    pub sessions_created: u64,
    pub sessions_evicted: u64,
}

/// What the interception chain needs from a registry.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Finds or creates the caller's session and resolves its bridge.
    async fn resolve_bridge(&self, client_id: &str) -> Result<Arc<ServerBridge>, RoutingError>;

    async fn client_ids(&self) -> Vec<String>;

    async fn stats(&self) -> RegistryStats;
}

pub(crate) struct RegistryInner {
    address: String,
    sessions: Mutex<HashMap<String, Arc<ClientSession>>>,
    factory: ServiceFactory,
    boundary: Arc<dyn IsolationBoundary>,
    directory: Arc<ObjectDirectory>,
    idle_timeout: IdleTimeout,
    disposed: AtomicBool,
    sessions_created: AtomicU64,
    sessions_evicted: AtomicU64,
    self_ref: Weak<RegistryInner>,
}

impl RegistryInner {
    fn bridge_prefix(&self) -> String {
        format!("{}/sessions", self.address)
    }

    fn disposed_error(&self) -> RoutingError {
        RoutingError::Disposed(format!("registry {}", self.address))
    }

    async fn get_or_create(&self, client_id: &str) -> Result<Arc<ClientSession>, RoutingError> {
        validate_client_id(client_id)?;

        let mut sessions = self.sessions.lock().await;
        if self.disposed.load(Ordering::SeqCst) {
            return Err(self.disposed_error());
        }

        if let Some(session) = sessions.get(client_id) {
            session.touch();
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(
            ClientSession::open(
                client_id,
                Arc::clone(&self.boundary),
                &self.factory,
                Arc::clone(&self.directory),
                &self.bridge_prefix(),
                self.idle_timeout,
            )
            .await?,
        );

        if self.idle_timeout.duration().is_some() {
            session.set_eviction_task(spawn_idle_eviction(
                self.self_ref.clone(),
                Arc::downgrade(&session),
            ));
        }

        sessions.insert(client_id.to_string(), Arc::clone(&session));
        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        info!(
            "Session created for {} on {} ({} live)",
            client_id,
            self.address,
            sessions.len()
        );
        Ok(session)
    }

    pub(crate) async fn evict_if_idle(&self, session: &Arc<ClientSession>) -> EvictionOutcome {
        {
            let mut sessions = self.sessions.lock().await;

            let registered = sessions
                .get(session.client_id())
                .is_some_and(|current| is_same_session(current, session));
            if !registered {
                return EvictionOutcome::Gone;
            }
            if !session.is_expired(Instant::now()) {
                return EvictionOutcome::Renewed;
            }

            sessions.remove(session.client_id());
            if !session.detach_for_eviction().await {
                return EvictionOutcome::Gone;
            }
            self.sessions_evicted.fetch_add(1, Ordering::SeqCst);
        }

        session.release().await;
        info!("Session for {} evicted after idle timeout", session.client_id());
        EvictionOutcome::Evicted
    }

    async fn snapshot_stats(&self) -> RegistryStats {
        let live_sessions = self.sessions.lock().await.len();
        RegistryStats {
            live_sessions,
            sessions_created: self.sessions_created.load(Ordering::SeqCst),
            sessions_evicted: self.sessions_evicted.load(Ordering::SeqCst),
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let live = self.sessions.get_mut().len();
        if !*self.disposed.get_mut() && live > 0 {
            warn!(
                "Session registry at {} dropped with {} live sessions; call dispose() first",
                self.address, live
            );
        }
    }
}

#[async_trait]
impl SessionResolver for RegistryInner {
    async fn resolve_bridge(&self, client_id: &str) -> Result<Arc<ServerBridge>, RoutingError> {
        self.get_or_create(client_id).await?.bridge()
    }

    async fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn stats(&self) -> RegistryStats {
        self.snapshot_stats().await
    }
}

/// Builder for `SessionRegistry`.
pub struct RegistryBuilder {
    address: String,
    factory: ServiceFactory,
    idle_timeout: IdleTimeout,
    boundary: Option<Arc<dyn IsolationBoundary>>,
    directory: Option<Arc<ObjectDirectory>>,
    rate_limit: Option<RateLimit>,
}

impl RegistryBuilder {
    pub fn idle_timeout(mut self, idle_timeout: IdleTimeout) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn boundary(mut self, boundary: Arc<dyn IsolationBoundary>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn directory(mut self, directory: Arc<ObjectDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Validates the address and installs the interception chain at it.
    pub async fn build(self) -> Result<SessionRegistry, RoutingError> {
        validate_registry_address(&self.address)?;
        let address = normalize_path(&self.address);
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(ObjectDirectory::new("local")));
        let boundary = self
            .boundary
            .unwrap_or_else(|| Arc::new(LogicalBoundary::new()) as Arc<dyn IsolationBoundary>);

        let inner = Arc::new_cyclic(|self_ref| RegistryInner {
            address: address.clone(),
            sessions: Mutex::new(HashMap::new()),
            factory: self.factory,
            boundary,
            directory: Arc::clone(&directory),
            idle_timeout: self.idle_timeout,
            disposed: AtomicBool::new(false),
            sessions_created: AtomicU64::new(0),
            sessions_evicted: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        });

        let weak_inner: Weak<RegistryInner> = Arc::downgrade(&inner);
        let resolver: Weak<dyn SessionResolver> = weak_inner;
        let mut chain = InterceptionChain::builder(Arc::new(RegistryEndpoint::new(resolver.clone())))
            .stage(Arc::new(LoggingStage::new(&address)));
        if let Some(rate_limit) = self.rate_limit {
            chain = chain.stage(Arc::new(RateLimitStage::new(rate_limit)));
        }
        let chain = chain.stage(Arc::new(IdentityRoutingStage::new(resolver))).build();

        directory.register_at(&address, Arc::new(chain)).await?;
        info!(
            "Session registry listening at {} on directory {}",
            address,
            directory.name()
        );

        Ok(SessionRegistry { inner })
    }
}

/// Multiplexes clients onto per-client sessions behind one address.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn builder(address: &str, factory: ServiceFactory) -> RegistryBuilder {
        RegistryBuilder {
            address: address.to_string(),
            factory,
            idle_timeout: IdleTimeout::Disabled,
            boundary: None,
            directory: None,
            rate_limit: None,
        }
    }

    /// Normalized object path the registry is installed at.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn directory(&self) -> &Arc<ObjectDirectory> {
        &self.inner.directory
    }

    pub fn idle_timeout(&self) -> IdleTimeout {
        self.inner.idle_timeout
    }

    /// Returns the client's session, creating it on first use. Resets the idle deadline.
    pub async fn get_or_create(&self, client_id: &str) -> Result<Arc<ClientSession>, RoutingError> {
        self.inner.get_or_create(client_id).await
    }

    /// `get_or_create` followed by `bridge`.
    pub async fn resolve_bridge(&self, client_id: &str) -> Result<Arc<ServerBridge>, RoutingError> {
        self.inner.resolve_bridge(client_id).await
    }

    pub async fn contains(&self, client_id: &str) -> bool {
        self.inner.sessions.lock().await.contains_key(client_id)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    pub async fn client_ids(&self) -> Vec<String> {
        self.inner.client_ids().await
    }

    pub async fn stats(&self) -> RegistryStats {
        self.inner.snapshot_stats().await
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Disposes one client's session right away. Returns false if it had none.
    pub async fn evict(&self, client_id: &str) -> bool {
        let session = {
            let mut sessions = self.inner.sessions.lock().await;
            let Some(session) = sessions.remove(client_id) else {
                return false;
            };
            if !session.detach_for_dispose().await {
                return false;
            }
            self.inner.sessions_evicted.fetch_add(1, Ordering::SeqCst);
            session
        };

        session.release().await;
        true
    }

    /// Tears down every session and stops accepting calls. Idempotent.
    pub async fn dispose(&self) {
        let detached = {
            let mut sessions = self.inner.sessions.lock().await;
            if self.inner.disposed.swap(true, Ordering::SeqCst) {
                return;
            }

            let mut detached = Vec::with_capacity(sessions.len());
            for (client_id, session) in sessions.drain() {
                if session.detach_for_dispose().await {
                    detached.push((client_id, session));
                }
            }
            detached
        };

        self.inner.directory.unregister(&self.inner.address).await;
        let count = detached.len();
        for (client_id, session) in detached {
            debug!("Disposing session for {}", client_id);
            session.release().await;
        }
        info!(
            "Session registry at {} disposed ({} sessions torn down)",
            self.inner.address, count
        );
    }
}
