//! Call model
//!
//! The envelope, result and fault types shared by every routing layer.

pub mod envelope;
pub mod fault;

pub use envelope::{CLIENT_ID_KEY, CallEnvelope, CallResult};
pub use fault::{Fault, FaultKind};
