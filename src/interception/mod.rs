//! Interception chain
//!
//! The ordered stages a call passes through between arriving at a
//! registry's address and reaching a session.

pub mod chain;
pub mod endpoint;
pub mod identity;

pub use chain::{CallStage, ChainBuilder, InterceptionChain, Next};
pub use endpoint::RegistryEndpoint;
pub use identity::IdentityRoutingStage;
