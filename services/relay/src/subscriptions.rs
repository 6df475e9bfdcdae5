//! Per-session subscription tracking and the aggregate interest set
//!
//! Tracks which products each session subscribes to, plus a ref-counted
//! product → subscriber-count map so the first subscriber and the last
//! unsubscriber system-wide are detected in O(log n) instead of rescanning
//! every session. The aggregate set (products with refcount ≥ 1) drives
//! upstream subscribe/unsubscribe calls.
//!
//! Invariant: a product has a refcount entry iff at least one live session
//! currently subscribes to it.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use types::catalog::ProductCatalog;
use types::ids::ProductId;

use crate::session::SessionId;

/// Aggregate-set transition caused by a registry call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryChange {
    /// Product gained its first subscriber system-wide; upstream interest
    /// must be added.
    FirstSubscriber,
    /// Product lost its last subscriber system-wide; upstream interest must
    /// be removed.
    LastSubscriber,
    /// The session's set changed with no aggregate transition.
    Changed,
    /// Request was a no-op: already in the requested state, unknown product,
    /// or unknown session.
    NoOp,
}

/// Session subscription registry with a ref-counted aggregate.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    catalog: ProductCatalog,
    sessions: BTreeMap<SessionId, BTreeSet<ProductId>>,
    refcounts: BTreeMap<ProductId, usize>,
}

impl SubscriptionRegistry {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self {
            catalog,
            sessions: BTreeMap::new(),
            refcounts: BTreeMap::new(),
        }
    }

    /// Register a session with an initial (possibly restored) subscription
    /// set.
    ///
    /// Products outside the catalog are discarded. Returns the products that
    /// gained their first subscriber system-wide, so the caller can add
    /// upstream interest for them.
    pub fn register(&mut self, session: SessionId, initial: Vec<ProductId>) -> Vec<ProductId> {
        let mut newly_interested = Vec::new();
        let mut set = BTreeSet::new();

        for product in initial {
            if !self.catalog.contains(&product) {
                debug!(session, product = %product, "Discarding non-catalog product from restored set");
                continue;
            }
            if set.insert(product.clone()) {
                let count = self.refcounts.entry(product.clone()).or_insert(0);
                *count += 1;
                if *count == 1 {
                    newly_interested.push(product);
                }
            }
        }

        self.sessions.insert(session, set);
        newly_interested
    }

    /// Subscribe a session to a product.
    ///
    /// No-op if already subscribed by that session or if the product is not
    /// in the catalog.
    pub fn subscribe(&mut self, session: SessionId, product: &ProductId) -> RegistryChange {
        if !self.catalog.contains(product) {
            return RegistryChange::NoOp;
        }
        let Some(set) = self.sessions.get_mut(&session) else {
            return RegistryChange::NoOp;
        };
        if !set.insert(product.clone()) {
            return RegistryChange::NoOp;
        }

        let count = self.refcounts.entry(product.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            RegistryChange::FirstSubscriber
        } else {
            RegistryChange::Changed
        }
    }

    /// Unsubscribe a session from a product.
    ///
    /// No-op if the session is not subscribed.
    pub fn unsubscribe(&mut self, session: SessionId, product: &ProductId) -> RegistryChange {
        let Some(set) = self.sessions.get_mut(&session) else {
            return RegistryChange::NoOp;
        };
        if !set.remove(product) {
            return RegistryChange::NoOp;
        }

        if self.decrement(product) {
            RegistryChange::LastSubscriber
        } else {
            RegistryChange::Changed
        }
    }

    /// Remove a session's entire subscription set on disconnect.
    ///
    /// Returns the products that became orphaned (lost their last
    /// subscriber) so the caller can remove upstream interest for each.
    pub fn release_all(&mut self, session: SessionId) -> Vec<ProductId> {
        let Some(set) = self.sessions.remove(&session) else {
            return Vec::new();
        };

        let mut orphaned = Vec::new();
        for product in set {
            if self.decrement(&product) {
                orphaned.push(product);
            }
        }
        orphaned
    }

    /// The session's current subscription set.
    pub fn products_of(&self, session: SessionId) -> Option<Vec<ProductId>> {
        self.sessions
            .get(&session)
            .map(|set| set.iter().cloned().collect())
    }

    /// Whether a session is subscribed to a product.
    pub fn is_subscribed(&self, session: SessionId, product: &ProductId) -> bool {
        self.sessions
            .get(&session)
            .is_some_and(|set| set.contains(product))
    }

    /// The aggregate set: products with at least one live subscriber.
    pub fn aggregate(&self) -> Vec<ProductId> {
        self.refcounts.keys().cloned().collect()
    }

    /// Whether any live session subscribes to a product.
    pub fn has_interest(&self, product: &ProductId) -> bool {
        self.refcounts.contains_key(product)
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Decrement a product's refcount; returns true when it reached zero.
    fn decrement(&mut self, product: &ProductId) -> bool {
        match self.refcounts.get_mut(product) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.refcounts.remove(product);
                true
            }
            None => false,
        }
    }
}
