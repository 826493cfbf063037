//! # Catalog Boundary
//!
//! The chain builder prices every cart line from an authoritative catalog.
//! The catalog itself (search, inventory, storage) is an external
//! collaborator; this module defines only the contract surface the
//! builder consumes, plus an in-memory implementation for tests and the
//! demo driver.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use amp_core::Amount;

/// Authoritative price and stock for a SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAndStock {
    /// Human-readable item description.
    pub description: String,
    /// Authoritative unit price.
    pub unit_price: Amount,
    /// Units currently available.
    pub available_quantity: u32,
    /// Merchandising category, if the catalog tracks one.
    pub category: Option<String>,
}

/// Catalog lookup failure, propagated as a cart build error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The SKU is not in the catalog.
    #[error("sku not found: {0}")]
    NotFound(String),

    /// Requested quantity exceeds available stock.
    #[error("insufficient stock for {sku}: requested {requested}, available {available}")]
    OutOfStock {
        /// The SKU in question.
        sku: String,
        /// Units requested.
        requested: u32,
        /// Units available.
        available: u32,
    },
}

/// Price/stock oracle consumed by the chain builder.
pub trait Catalog: Send + Sync {
    /// Authoritative price and stock for a SKU.
    fn price_and_stock(&self, sku: &str) -> Result<PriceAndStock, CatalogError>;
}

/// In-memory catalog for tests and the demo driver.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<String, PriceAndStock>>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a SKU.
    pub fn stock(&self, sku: impl Into<String>, item: PriceAndStock) {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(sku.into(), item);
    }
}

impl Catalog for InMemoryCatalog {
    fn price_and_stock(&self, sku: &str) -> Result<PriceAndStock, CatalogError> {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(sku)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(sku.to_string()))
    }
}
