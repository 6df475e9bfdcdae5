//! Persistence collaborator contract for saved subscription sets
//!
//! The durable backend is an external collaborator behind a narrow
//! read/write trait. The relay tolerates both call types failing: a failed
//! `get` degrades to an empty set, a failed `put` is logged and the session
//! continues with transient in-memory state.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use types::ids::ProductId;

use crate::error::StoreError;

/// Narrow read/write contract for saved subscription sets.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Saved products for an identity, or `None` if no record exists.
    async fn get(&self, identity: &str) -> Result<Option<Vec<ProductId>>, StoreError>;

    /// Persist the identity's current products, replacing any prior record.
    async fn put(&self, identity: &str, products: &[ProductId]) -> Result<(), StoreError>;
}

/// In-memory store, used as the always-available fallback implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Vec<ProductId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get(&self, identity: &str) -> Result<Option<Vec<ProductId>>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(records.get(identity).cloned())
    }

    async fn put(&self, identity: &str, products: &[ProductId]) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        records.insert(identity.to_string(), products.to_vec());
        Ok(())
    }
}
