//! Identifier types for relay entities
//!
//! Products are opaque identifiers from a fixed catalog known at startup.
//! Identity tokens for downstream sessions use UUID v7 for time-sortable
//! ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Product identifier (tradable instrument)
///
/// Format: "BASE-QUOTE" (e.g., "BTC-USD", "ETH-USD"). The set of valid
/// products is fixed for the process lifetime; see [`crate::catalog`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new ProductId from a string
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque unique identity token for a downstream session
///
/// Uses UUID v7 so tokens sort chronologically by assignment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityToken(Uuid);

impl IdentityToken {
    /// Create a new IdentityToken with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IdentityToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
