//! Rate limiting middleware
//!
//! Caps how many routed calls each client may make per time window.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::call::{CallEnvelope, CallResult, Fault, FaultKind};
use crate::interception::{CallStage, Next};

/// At most `max_calls` per client within any `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_calls: usize,
    pub window: Duration,
}

/// Sliding-window rate limiter keyed by client id
pub struct RateLimiter {
    requests: HashMap<String, VecDeque<Instant>>,
    limit: RateLimit,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            requests: HashMap::new(),
            limit,
        }
    }

    pub fn is_allowed(&mut self, client_id: &str) -> bool {
        let now = Instant::now();
        let window = self.limit.window;
        let entry = self.requests.entry(client_id.to_string()).or_default();

        // Remove old requests
        while entry
            .front()
            .is_some_and(|&time| now.duration_since(time) > window)
        {
            entry.pop_front();
        }

        if entry.len() < self.limit.max_calls {
            entry.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops clients with no call inside the current window.
    pub fn prune(&mut self) {
        let now = Instant::now();
        let window = self.limit.window;
        self.requests.retain(|_, times| {
            times
                .back()
                .is_some_and(|&time| now.duration_since(time) <= window)
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

pub struct RateLimitStage {
    limiter: Mutex<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limiter: Mutex::new(RateLimiter::new(limit)),
        }
    }
}

#[async_trait]
impl CallStage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    /// Calls without a client id pass; the routing stage decides about them.
    async fn process(&self, call: CallEnvelope, next: Next<'_>) -> CallResult {
        if let Some(client_id) = call.client_id() {
            let allowed = {
                let mut limiter = self.limiter.lock().unwrap_or_else(PoisonError::into_inner);
                if limiter.tracked_clients() > 1024 {
                    limiter.prune();
                }
                limiter.is_allowed(client_id)
            };
            if !allowed {
                return Err(Fault::new(
                    FaultKind::RateLimited,
                    format!("Client {} exceeded its call rate", client_id),
                ));
            }
        }
        next.run(call).await
    }
}
