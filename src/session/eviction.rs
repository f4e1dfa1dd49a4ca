//! Idle eviction
//!
//! One timer task per session sleeps until the session's deadline, then asks
//! the registry to evict it. A deadline that moved in the meantime just
//! restarts the sleep.

use log::debug;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time;

use crate::session::client_session::ClientSession;
use crate::session::registry::RegistryInner;

/// What the registry did when a session's timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvictionOutcome {
    Evicted,
    /// The session was accessed since the timer was armed.
    Renewed,
    /// The session already left the registry.
    Gone,
}

pub(crate) fn spawn_idle_eviction(
    registry: Weak<RegistryInner>,
    session: Weak<ClientSession>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(deadline) = session.upgrade().and_then(|s| s.deadline()) else {
                return;
            };
            time::sleep_until(deadline).await;

            let (Some(registry), Some(session)) = (registry.upgrade(), session.upgrade()) else {
                return;
            };
            match registry.evict_if_idle(&session).await {
                EvictionOutcome::Renewed => continue,
                outcome => {
                    debug!(
                        "Idle timer for {} finished: {:?}",
                        session.client_id(),
                        outcome
                    );
                    return;
                }
            }
        }
    })
}

/// Compares by identity so a timer never evicts a newer session for the same id.
pub(crate) fn is_same_session(a: &Arc<ClientSession>, b: &Arc<ClientSession>) -> bool {
    Arc::ptr_eq(a, b)
}
