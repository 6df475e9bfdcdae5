//! Bounded per-product trade history
//!
//! Keeps the most recent trade prints per product in a fixed-capacity ring;
//! recording evicts the oldest when full. Duplicates are not filtered —
//! replaying the same print twice produces two entries, mirroring upstream
//! delivery semantics.

use std::collections::{BTreeMap, VecDeque};

use types::ids::ProductId;

use crate::protocol::TradePrint;

/// Default ring capacity per product.
pub const DEFAULT_CAPACITY: usize = 50;

/// Per-product bounded trade rings.
#[derive(Debug)]
pub struct TradeHistory {
    rings: BTreeMap<ProductId, VecDeque<TradePrint>>,
    capacity: usize,
}

impl TradeHistory {
    /// Create a trade history with the given per-product ring capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            rings: BTreeMap::new(),
            capacity,
        }
    }

    /// Append a trade to its product's ring, evicting the oldest when full.
    ///
    /// O(1) amortized.
    pub fn record(&mut self, trade: TradePrint) {
        let ring = self
            .rings
            .entry(trade.product_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));

        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(trade);
    }

    /// Recent trades for a product, newest first, length ≤ capacity.
    pub fn recent(&self, product: &ProductId) -> Vec<TradePrint> {
        self.rings
            .get(product)
            .map(|ring| ring.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of trades currently held for a product.
    pub fn len(&self, product: &ProductId) -> usize {
        self.rings.get(product).map(VecDeque::len).unwrap_or(0)
    }

    /// Whether no trades are held for a product.
    pub fn is_empty(&self, product: &ProductId) -> bool {
        self.len(product) == 0
    }
}

impl Default for TradeHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
