pub mod boundary;
pub mod bridge;
pub mod call;
pub mod config;
pub mod error;
pub mod interception;
pub mod middleware;
pub mod proxy;
pub mod server;
pub mod service;
pub mod session;
pub mod transport;
pub mod utils;

pub use bridge::ServerBridge;
pub use call::{CLIENT_ID_KEY, CallEnvelope, CallResult, Fault, FaultKind};
pub use error::RoutingError;
pub use proxy::ClientProxy;
pub use server::TcpHost;
pub use session::{ClientSession, IdleTimeout, SessionRegistry};
