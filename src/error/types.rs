//! Error types
//!
//! Defines the error types raised by each layer of the session router.

use std::fmt;
use std::io;

/// Isolation boundary errors
#[derive(Debug)]
pub enum BoundaryError {
    CreateFailed(String),
    UnknownHandle(u64),
    InstantiateFailed(String),
    Terminated(String),
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryError::CreateFailed(msg) => write!(f, "Boundary creation failed: {}", msg),
            BoundaryError::UnknownHandle(id) => write!(f, "Unknown boundary handle: {}", id),
            BoundaryError::InstantiateFailed(msg) => {
                write!(f, "Service instantiation failed: {}", msg)
            }
            BoundaryError::Terminated(msg) => write!(f, "Boundary terminated: {}", msg),
        }
    }
}

impl std::error::Error for BoundaryError {}

/// Errors raised by hosted services
#[derive(Debug)]
pub enum ServiceError {
    ConstructionFailed(String),
    DisposeFailed(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::ConstructionFailed(msg) => {
                write!(f, "Service construction failed: {}", msg)
            }
            ServiceError::DisposeFailed(msg) => write!(f, "Service dispose failed: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Transport layer errors
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    Codec(serde_json::Error),
    ConnectionClosed(String),
    FrameTooLong(usize),
    PathInUse(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
            TransportError::Codec(e) => write!(f, "Codec error: {}", e),
            TransportError::ConnectionClosed(peer) => write!(f, "Connection closed by {}", peer),
            TransportError::FrameTooLong(len) => write!(f, "Frame too long: {} bytes", len),
            TransportError::PathInUse(path) => write!(f, "Object path already in use: {}", path),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io(error)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        TransportError::Codec(error)
    }
}

/// Routing error that encompasses every failure the router can surface
#[derive(Debug)]
pub enum RoutingError {
    InvalidArgument(String),
    MissingClientIdentity,
    NoChannelFound(String),
    Disposed(String),
    ServiceDisposeFailure { client_id: String, reason: String },
    Boundary(BoundaryError),
    Service(ServiceError),
    Transport(TransportError),
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            RoutingError::MissingClientIdentity => {
                write!(f, "Routed call carries no client identity")
            }
            RoutingError::NoChannelFound(addr) => write!(f, "No channel found for {}", addr),
            RoutingError::Disposed(what) => write!(f, "{} has been disposed", what),
            RoutingError::ServiceDisposeFailure { client_id, reason } => {
                write!(f, "Disposing service for {} failed: {}", client_id, reason)
            }
            RoutingError::Boundary(e) => write!(f, "Boundary error: {}", e),
            RoutingError::Service(e) => write!(f, "Service error: {}", e),
            RoutingError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for RoutingError {}

impl From<BoundaryError> for RoutingError {
    fn from(error: BoundaryError) -> Self {
        RoutingError::Boundary(error)
    }
}

impl From<ServiceError> for RoutingError {
    fn from(error: ServiceError) -> Self {
        RoutingError::Service(error)
    }
}

impl From<TransportError> for RoutingError {
    fn from(error: TransportError) -> Self {
        RoutingError::Transport(error)
    }
}
