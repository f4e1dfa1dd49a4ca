//! Error handlers
//!
//! Maps routing errors onto fault responses and logs cleanup failures.

use crate::call::{Fault, FaultKind};
use crate::error::types::RoutingError;
use log::{error, warn};

/// Log a routing error. Cleanup failures are expected noise and logged as warnings.
pub fn handle_error(err: &RoutingError) {
    match err {
        RoutingError::ServiceDisposeFailure { .. } | RoutingError::Boundary(_) => {
            warn!("Session router cleanup error: {}", err)
        }
        _ => error!("Session router error: {}", err),
    }
}

/// Convert error to the fault kind carried back to the caller
pub fn error_to_fault_kind(err: &RoutingError) -> FaultKind {
    match err {
        RoutingError::InvalidArgument(_) => FaultKind::InvalidArgument,
        RoutingError::MissingClientIdentity => FaultKind::MissingClientIdentity,
        RoutingError::NoChannelFound(_) => FaultKind::Transport,
        RoutingError::Disposed(_) => FaultKind::Disposed,
        RoutingError::ServiceDisposeFailure { .. } => FaultKind::Service,
        RoutingError::Boundary(_) => FaultKind::Service,
        RoutingError::Service(_) => FaultKind::Service,
        RoutingError::Transport(_) => FaultKind::Transport,
    }
}

impl From<RoutingError> for Fault {
    fn from(err: RoutingError) -> Self {
        Fault::new(error_to_fault_kind(&err), err.to_string())
    }
}
