//! Session management system
//!
//! Per-client sessions, the registry that owns them and idle eviction.

pub mod client_session;
mod eviction;
pub mod registry;
pub mod state;

pub use client_session::ClientSession;
pub use registry::{RegistryBuilder, RegistryStats, SessionRegistry, SessionResolver};
pub use state::{IdleTimeout, SessionState};
