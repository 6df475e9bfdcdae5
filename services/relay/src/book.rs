//! Order book state reconstructed from snapshot + diff messages
//!
//! One book per product, created on first snapshot and replaced wholesale on
//! every snapshot. Each side is a price-keyed `BTreeMap` so a diff change is
//! an O(log n) insert/overwrite/delete and iteration is deterministic.
//! Diffs arriving before any snapshot for a product are silently dropped;
//! state self-heals once a snapshot arrives.
//!
//! The store only mutates state; the engine is responsible for triggering
//! fan-out after a successful apply.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::ids::ProductId;
use types::market::Side;

use crate::protocol::{LevelChange, WireLevel};

/// Point-in-time view of one product's book, levels in ascending price order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub bids: Vec<WireLevel>,
    pub asks: Vec<WireLevel>,
}

/// One product's bid/ask level tables.
///
/// Invariant: at most one level per price per side, and no zero-size levels.
#[derive(Debug, Clone, Default)]
struct OrderBook {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

impl OrderBook {
    fn from_levels(bids: Vec<WireLevel>, asks: Vec<WireLevel>) -> Self {
        Self {
            bids: bids.into_iter().collect(),
            asks: asks.into_iter().collect(),
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Apply one change: zero size deletes the level if present, otherwise
    /// the price is overwritten or inserted.
    fn apply_change(&mut self, side: Side, price: Decimal, size: Decimal) {
        let levels = self.side_mut(side);
        if size.is_zero() {
            levels.remove(&price);
        } else {
            levels.insert(price, size);
        }
    }

    fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids.iter().map(|(p, s)| (*p, *s)).collect(),
            asks: self.asks.iter().map(|(p, s)| (*p, *s)).collect(),
        }
    }
}

/// Per-product order book store.
///
/// Books live for the process lifetime once seen; there is no teardown.
#[derive(Debug, Default)]
pub struct BookStore {
    books: BTreeMap<ProductId, OrderBook>,
    diffs_dropped: u64,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the book for a product wholesale, creating it on first sight.
    pub fn apply_snapshot(
        &mut self,
        product: ProductId,
        bids: Vec<WireLevel>,
        asks: Vec<WireLevel>,
    ) {
        self.books
            .insert(product, OrderBook::from_levels(bids, asks));
    }

    /// Apply a diff batch to an existing book.
    ///
    /// Returns `false` without mutating anything when no snapshot has been
    /// seen for the product yet.
    pub fn apply_diff(&mut self, product: &ProductId, changes: &[LevelChange]) -> bool {
        let Some(book) = self.books.get_mut(product) else {
            self.diffs_dropped += 1;
            debug!(
                product = %product,
                dropped = self.diffs_dropped,
                "Dropping diff received before snapshot"
            );
            return false;
        };

        for (side, price, size) in changes {
            book.apply_change(*side, *price, *size);
        }
        true
    }

    /// Current state of a product's book, or `None` if not yet known.
    pub fn snapshot_of(&self, product: &ProductId) -> Option<BookSnapshot> {
        self.books.get(product).map(OrderBook::snapshot)
    }

    /// Number of products with a known book.
    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Total diffs dropped for arriving before a snapshot.
    pub fn diffs_dropped(&self) -> u64 {
        self.diffs_dropped
    }
}
