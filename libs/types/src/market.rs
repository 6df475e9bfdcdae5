//! Market primitives shared across the relay
//!
//! The upstream feed encodes sides as lowercase strings (`"buy"`/`"sell"`),
//! both in trade prints and in book diff changes.

use serde::{Deserialize, Serialize};

/// Order side (bid or ask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy side (bid)
    Buy,
    /// Sell side (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}
