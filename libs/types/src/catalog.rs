//! Fixed product catalog
//!
//! The set of tradable products is closed and known at startup; it never
//! changes for the process lifetime. Session requests naming a product
//! outside the catalog are rejected without effect.

use crate::ids::ProductId;

/// Immutable set of products the relay serves.
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    products: Vec<ProductId>,
}

impl ProductCatalog {
    /// Build a catalog from the configured product list.
    pub fn new(products: Vec<ProductId>) -> Self {
        Self { products }
    }

    /// Check whether a product belongs to the catalog.
    pub fn contains(&self, product: &ProductId) -> bool {
        self.products.iter().any(|p| p == product)
    }

    /// Resolve a raw symbol into a catalog product, if known.
    pub fn resolve(&self, symbol: &str) -> Option<ProductId> {
        self.products.iter().find(|p| p.as_str() == symbol).cloned()
    }

    /// All products in the catalog.
    pub fn products(&self) -> &[ProductId] {
        &self.products
    }

    /// Number of products in the catalog.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
