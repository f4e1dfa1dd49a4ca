//! Module `address`
//!
//! Parses target addresses of the form `scheme://authority/path`.

use std::fmt;

use crate::error::RoutingError;

const SCHEME_DELIMITER: &str = "://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    scheme: String,
    authority: String,
    path: String,
}

impl Address {
    /// Splits an address into scheme, authority and object path.
    ///
    /// The scheme is everything before the first `://`. The path always
    /// starts with `/`; an address without one targets `/`.
    pub fn parse(raw: &str) -> Result<Self, RoutingError> {
        let raw = raw.trim();
        let (scheme, rest) = raw.split_once(SCHEME_DELIMITER).ok_or_else(|| {
            RoutingError::InvalidArgument(format!("address has no scheme delimiter: {}", raw))
        })?;
        if scheme.is_empty() {
            return Err(RoutingError::InvalidArgument(format!(
                "address has an empty scheme: {}",
                raw
            )));
        }

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, normalize_path(path)),
            None => (rest, "/".to_string()),
        };

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            authority: authority.to_string(),
            path,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)
    }
}

/// Normalizes an object path to a single leading `/` and no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim().trim_matches('/'))
}
