//! Session state
//!
//! Lifecycle states, the idle-timeout policy and the lock-free expiry clock
//! a session resets on every access.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of a `ClientSession`. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Evicting,
    Disposed,
}

impl SessionState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            SessionState::Active => 0,
            SessionState::Evicting => 1,
            SessionState::Disposed => 2,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Active,
            1 => SessionState::Evicting,
            _ => SessionState::Disposed,
        }
    }
}

/// How long a session may sit idle before it is evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTimeout {
    /// Sessions live until the registry is disposed.
    Disabled,
    After(Duration),
}

impl IdleTimeout {
    /// `0` means disabled.
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            IdleTimeout::Disabled
        } else {
            IdleTimeout::After(Duration::from_millis(millis))
        }
    }

    pub fn duration(self) -> Option<Duration> {
        match self {
            IdleTimeout::Disabled => None,
            IdleTimeout::After(duration) => Some(duration),
        }
    }
}

/// Expiry deadline stored as nanoseconds past a fixed origin, so touching
/// never needs a lock.
pub struct ExpiryClock {
    origin: Instant,
    deadline_nanos: AtomicU64,
    timeout: IdleTimeout,
}

impl ExpiryClock {
    pub fn new(timeout: IdleTimeout) -> Self {
        let clock = Self {
            origin: Instant::now(),
            deadline_nanos: AtomicU64::new(0),
            timeout,
        };
        clock.touch();
        clock
    }

    pub fn timeout(&self) -> IdleTimeout {
        self.timeout
    }

    /// Pushes the deadline to `now + timeout`. Never moves it backwards.
    pub fn touch(&self) {
        if let Some(timeout) = self.timeout.duration() {
            let deadline = self.offset_of(Instant::now() + timeout);
            self.deadline_nanos.fetch_max(deadline, Ordering::SeqCst);
        }
    }

    /// `None` when eviction is disabled.
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.duration()?;
        let nanos = self.deadline_nanos.load(Ordering::SeqCst);
        Some(self.origin + Duration::from_nanos(nanos))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    fn offset_of(&self, instant: Instant) -> u64 {
        instant
            .saturating_duration_since(self.origin)
            .as_nanos()
            .min(u64::MAX as u128) as u64
    }
}
