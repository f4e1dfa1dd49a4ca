//! Transport collaborator
//!
//! Object directory on the serving side, channel bindings on the calling
//! side, and the bundled in-process and TCP channels.

pub mod address;
pub mod channel_registry;
pub mod directory;
pub mod inproc;
pub mod tcp;
pub mod wire;

// Re-export key types
pub use address::Address;
pub use channel_registry::{ChannelBinding, ChannelRegistry};
pub use directory::{CallSink, ObjectDirectory};
pub use inproc::InProcBinding;
pub use tcp::TcpBinding;
