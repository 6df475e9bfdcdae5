//! Error taxonomy for the relay service
//!
//! Nothing here is fatal to the process: upstream disconnects reconnect,
//! malformed messages are logged and ignored, and store failures degrade to
//! transient in-memory state. The only errors crossing a module boundary
//! come from the persistence collaborator; everything else is handled at
//! the point it occurs.

use thiserror::Error;

/// Errors surfaced by the persistence collaborator.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("subscription store unavailable: {0}")]
    Unavailable(String),

    #[error("subscription store write failed: {0}")]
    WriteFailed(String),
}
