//! Configuration management for the session router host
//!
//! Settings come from built-in defaults, then an optional `config.toml`,
//! then `SESSION_ROUTER_*` environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::middleware::rate_limit::RateLimit;
use crate::session::IdleTimeout;
use crate::transport::wire::DEFAULT_MAX_FRAME_LENGTH;

const ENV_PREFIX: &str = "SESSION_ROUTER";
const DEFAULT_CONFIG_PATH: &str = "config";

/// Which isolation boundary hosts client services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Task,
    Logical,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    // ═══ NETWORK ═══
    /// IP address the TCP host binds to
    pub bind_address: String,

    /// Port the TCP host listens on
    pub port: u16,

    /// Name of this node's object directory (`inproc://<node_name>/...`)
    pub node_name: String,

    /// Largest accepted frame, in bytes
    pub max_frame_length: usize,

    // ═══ SESSIONS ═══
    /// Object path the session registry is installed at
    pub registry_path: String,

    /// Idle time before a session is evicted; 0 disables eviction
    pub idle_timeout_ms: u64,

    /// `task` or `logical`
    pub boundary: BoundaryKind,

    // ═══ RATE LIMITING ═══
    /// Calls allowed per client and window; 0 disables the limit
    pub rate_limit_max_calls: usize,
    pub rate_limit_window_ms: u64,
}

impl HostConfig {
    /// Load configuration from `config.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("bind_address", "127.0.0.1")?
            .set_default("port", 2121_i64)?
            .set_default("node_name", "local")?
            .set_default("max_frame_length", DEFAULT_MAX_FRAME_LENGTH as i64)?
            .set_default("registry_path", "sessions")?
            .set_default("idle_timeout_ms", 300_000_i64)?
            .set_default("boundary", "task")?
            .set_default("rate_limit_max_calls", 0_i64)?
            .set_default("rate_limit_window_ms", 1_000_i64)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: HostConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.node_name.trim().is_empty() {
            return Err(ConfigError::Message("node_name cannot be empty".into()));
        }

        if self.registry_path.trim().trim_matches('/').is_empty() {
            return Err(ConfigError::Message("registry_path cannot be empty".into()));
        }

        if self.max_frame_length == 0 {
            return Err(ConfigError::Message(
                "max_frame_length must be greater than 0".into(),
            ));
        }

        if self.rate_limit_max_calls > 0 && self.rate_limit_window_ms == 0 {
            return Err(ConfigError::Message(
                "rate_limit_window_ms must be greater than 0 when a rate limit is set".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and port as a socket address string
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn idle_timeout(&self) -> IdleTimeout {
        IdleTimeout::from_millis(self.idle_timeout_ms)
    }

    pub fn rate_limit(&self) -> Option<RateLimit> {
        (self.rate_limit_max_calls > 0).then(|| RateLimit {
            max_calls: self.rate_limit_max_calls,
            window: Duration::from_millis(self.rate_limit_window_ms),
        })
    }
}
