use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Account address in canonical form: trimmed and lowercased.
///
/// Addresses that differ only by letter case compare equal once wrapped,
/// which is what makes `0xABC...` and `0xabc...` share one index entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Normalize without validation. Blank input yields an empty address.
    pub fn new(raw: &str) -> Self {
        Self(normalize_address(raw))
    }

    /// Normalize and reject blank input
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let address = Self::new(raw);
        if address.0.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        Ok(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw address taken from a node response
    pub fn matches(&self, other: Option<&str>) -> bool {
        match other {
            Some(raw) => raw.trim().eq_ignore_ascii_case(&self.0),
            None => false,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize an Ethereum address to lowercase, keeping its `0x` prefix
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
