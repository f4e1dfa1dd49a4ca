//! Input validation utilities
//!
//! Checks applied to client ids and registry addresses before they are used.

use crate::error::RoutingError;

/// Longest client id the registry accepts.
pub const MAX_CLIENT_ID_LENGTH: usize = 256;

/// Validate that input is not empty and doesn't contain control characters
pub fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty() && input.len() <= max_length && !input.contains(char::is_control)
}

pub fn validate_client_id(client_id: &str) -> Result<(), RoutingError> {
    if client_id.is_empty() {
        return Err(RoutingError::InvalidArgument(
            "client id must not be empty".into(),
        ));
    }
    if !is_valid_input(client_id, MAX_CLIENT_ID_LENGTH) {
        return Err(RoutingError::InvalidArgument(format!(
            "malformed client id: {:?}",
            client_id
        )));
    }
    Ok(())
}

/// A registry address is an object path such as `calc` or `/apps/calc`.
pub fn validate_registry_address(address: &str) -> Result<(), RoutingError> {
    let trimmed = address.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(RoutingError::InvalidArgument(
            "registry address must not be empty".into(),
        ));
    }
    if trimmed.contains(char::is_whitespace) || trimmed.contains(char::is_control) {
        return Err(RoutingError::InvalidArgument(format!(
            "malformed registry address: {:?}",
            address
        )));
    }
    Ok(())
}
