//! Registry middleware
//!
//! Interception stages for call logging and per-client rate limiting.

pub mod logging;
pub mod rate_limit;
