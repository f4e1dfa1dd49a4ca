//! TCP host
//!
//! Accept loop and per-connection handler that expose an object directory
//! to `tcp://` clients.

pub mod core;
pub mod handler;

pub use self::core::TcpHost;
