//! Fault responses
//!
//! Per-call failures travel back to the caller as a `Fault` value on the same
//! path a successful result takes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    InvalidArgument,
    MissingClientIdentity,
    Disposed,
    NoSuchObject,
    UnknownMethod,
    RateLimited,
    Service,
    Transport,
}

/// Serializable fault carried in place of a call's return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn disposed(what: &str) -> Self {
        Self::new(FaultKind::Disposed, format!("{} has been disposed", what))
    }

    pub fn no_such_object(path: &str) -> Self {
        Self::new(FaultKind::NoSuchObject, format!("No object registered at {}", path))
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(FaultKind::UnknownMethod, format!("Unknown method: {}", method))
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Service, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Transport, message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}
