//! Client session management
//!
//! A `ClientSession` pairs one client id with its isolation boundary, the
//! service living inside it and the bridge that fronts that service.

use log::{debug, info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::boundary::{BoundaryHandle, IsolationBoundary};
use crate::bridge::ServerBridge;
use crate::error::RoutingError;
use crate::error::handlers::handle_error;
use crate::service::{ServiceFactory, ServiceRef};
use crate::session::state::{ExpiryClock, IdleTimeout, SessionState};
use crate::transport::ObjectDirectory;

/// Resources owned exclusively by a live session; taken exactly once on teardown.
struct SessionResources {
    boundary_handle: BoundaryHandle,
    service: ServiceRef,
}

pub struct ClientSession {
    client_id: String,
    state: AtomicU8,
    clock: ExpiryClock,
    bridge: Arc<ServerBridge>,
    boundary: Arc<dyn IsolationBoundary>,
    resources: Mutex<Option<SessionResources>>,
    eviction_task: Mutex<Option<JoinHandle<()>>>,
}

impl ClientSession {
    /// Creates the boundary, instantiates the service inside it and
    /// registers the bridge, in that order.
    ///
    /// Anything acquired before a failing step is released again before
    /// the error is returned.
    pub(crate) async fn open(
        client_id: &str,
        boundary: Arc<dyn IsolationBoundary>,
        factory: &ServiceFactory,
        directory: Arc<ObjectDirectory>,
        bridge_prefix: &str,
        idle_timeout: IdleTimeout,
    ) -> Result<Self, RoutingError> {
        let boundary_handle = boundary.create(client_id).await?;

        let service = match boundary.instantiate(&boundary_handle, factory).await {
            Ok(service) => service,
            Err(e) => {
                release_boundary(boundary.as_ref(), boundary_handle).await;
                return Err(e.into());
            }
        };

        let bridge = match ServerBridge::register(
            directory,
            bridge_prefix,
            client_id,
            Arc::clone(&service),
        )
        .await
        {
            Ok(bridge) => bridge,
            Err(e) => {
                dispose_service(client_id, &service).await;
                release_boundary(boundary.as_ref(), boundary_handle).await;
                return Err(e);
            }
        };

        debug!(
            "Session for {} opened in {} boundary {}",
            client_id,
            boundary.kind(),
            boundary_handle.id()
        );

        Ok(Self {
            client_id: client_id.to_string(),
            state: AtomicU8::new(SessionState::Active.as_u8()),
            clock: ExpiryClock::new(idle_timeout),
            bridge: Arc::new(bridge),
            boundary,
            resources: Mutex::new(Some(SessionResources {
                boundary_handle,
                service,
            })),
            eviction_task: Mutex::new(None),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == SessionState::Disposed
    }

    /// Resets the idle deadline. No-op when eviction is disabled.
    pub fn touch(&self) {
        self.clock.touch();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.clock.deadline()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.clock.is_expired(now)
    }

    /// Resolves the bridge to the live service, counting as an access.
    pub fn bridge(&self) -> Result<Arc<ServerBridge>, RoutingError> {
        if self.state() != SessionState::Active {
            return Err(RoutingError::Disposed(format!("session {}", self.client_id)));
        }
        self.touch();
        Ok(Arc::clone(&self.bridge))
    }

    pub(crate) fn set_eviction_task(&self, task: JoinHandle<()>) {
        let previous = self
            .eviction_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// First half of explicit disposal, run while the registry removes the
    /// session: Active goes straight to Disposed and the bridge stops routing.
    /// Returns false if the session was already disposed.
    pub(crate) async fn detach_for_dispose(&self) -> bool {
        if self.state.swap(SessionState::Disposed.as_u8(), Ordering::SeqCst)
            == SessionState::Disposed.as_u8()
        {
            return false;
        }
        let task = self
            .eviction_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        self.bridge.retire().await;
        true
    }

    /// First half of idle eviction: Active -> Evicting. Returns false if the
    /// session was no longer active.
    pub(crate) async fn detach_for_eviction(&self) -> bool {
        if self
            .state
            .compare_exchange(
                SessionState::Active.as_u8(),
                SessionState::Evicting.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return false;
        }
        // Called from the eviction task itself; dropping the handle detaches it.
        self.eviction_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.bridge.retire().await;
        true
    }

    /// Disposes the service, then tears down the boundary, and marks the
    /// session Disposed.
    ///
    /// May wait for calls still running inside the boundary, so it must not
    /// run under the registry lock.
    pub(crate) async fn release(&self) {
        let resources = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(resources) = resources else {
            return;
        };

        dispose_service(&self.client_id, &resources.service).await;
        release_boundary(self.boundary.as_ref(), resources.boundary_handle).await;
        self.state
            .store(SessionState::Disposed.as_u8(), Ordering::SeqCst);
        info!("Session for {} torn down", self.client_id);
    }
}

async fn dispose_service(client_id: &str, service: &ServiceRef) {
    if let Err(e) = service.dispose().await {
        handle_error(&RoutingError::ServiceDisposeFailure {
            client_id: client_id.to_string(),
            reason: e.to_string(),
        });
    }
}

async fn release_boundary(boundary: &dyn IsolationBoundary, handle: BoundaryHandle) {
    let id = handle.id();
    if let Err(e) = boundary.teardown(handle).await {
        warn!("Teardown of {} boundary {} failed: {}", boundary.kind(), id, e);
    }
}
