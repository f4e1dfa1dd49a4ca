//! Error handling
//!
//! Defines error types and handling for the session router.

pub mod handlers;
pub mod types;

pub use types::*;
