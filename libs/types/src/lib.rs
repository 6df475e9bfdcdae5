//! Types library for the market-data relay
//!
//! This library provides the core type definitions shared across the relay
//! service: product identifiers, the fixed product catalog, and market
//! primitives.
//!
//! # Modules
//! - `ids`: Unique identifiers (ProductId)
//! - `market`: Market primitives (Side)
//! - `catalog`: Fixed, closed product catalog known at startup

// Public modules
pub mod ids;
pub mod market;
pub mod catalog;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::market::*;
    pub use crate::catalog::*;
}
