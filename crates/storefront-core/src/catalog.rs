//! # Catalog Snapshot
//!
//! The product view this core consumes from the Catalog collaborator.
//! The catalog owns the stock counters; this core only reads a snapshot
//! and issues increment/decrement commands.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product Status
// =============================================================================

/// Publication state of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Visible and purchasable.
    Active,
    /// Not yet published.
    Draft,
    /// Withdrawn from sale.
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Draft => "draft",
            ProductStatus::Archived => "archived",
        }
    }

    /// Parses the stored representation. Unknown values are treated as
    /// draft so they never become purchasable by accident.
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => ProductStatus::Active,
            "archived" => ProductStatus::Archived,
            _ => ProductStatus::Draft,
        }
    }
}

impl Default for ProductStatus {
    fn default() -> Self {
        ProductStatus::Draft
    }
}

// =============================================================================
// Product Snapshot
// =============================================================================

/// Stock for one size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SizeStock {
    pub size: String,
    pub stock: i64,
}

/// A product as returned by `Catalog::get_product`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSnapshot {
    pub id: String,
    pub name: String,
    /// Current selling price per unit.
    pub price: Money,
    pub status: ProductStatus,
    /// Global stock counter across all sizes.
    pub stock_quantity: i64,
    pub sizes: Vec<SizeStock>,
    pub category_id: Option<String>,
    pub team_id: Option<String>,
    /// Primary image shown on order lines.
    pub image: Option<String>,
}

impl ProductSnapshot {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Stock for a specific size, if the product carries that size.
    pub fn size_stock(&self, size: &str) -> Option<i64> {
        self.sizes
            .iter()
            .find(|s| s.size == size)
            .map(|s| s.stock)
    }

    /// Units that can be sold for a line.
    ///
    /// With a size, the size counter is authoritative; the global counter
    /// still caps it. Without a size only the global counter applies.
    pub fn available_for(&self, size: Option<&str>) -> Option<i64> {
        match size {
            Some(size) => self
                .size_stock(size)
                .map(|stock| stock.min(self.stock_quantity)),
            None => Some(self.stock_quantity),
        }
    }

    /// Whether the product can currently be bought at all.
    ///
    /// Cart subtotals only count lines for which this holds.
    pub fn is_available(&self) -> bool {
        self.is_active() && self.stock_quantity > 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn jersey() -> ProductSnapshot {
        ProductSnapshot {
            id: "p1".to_string(),
            name: "Home Jersey".to_string(),
            price: Money::from_major(500),
            status: ProductStatus::Active,
            stock_quantity: 10,
            sizes: vec![
                SizeStock {
                    size: "M".to_string(),
                    stock: 4,
                },
                SizeStock {
                    size: "L".to_string(),
                    stock: 20,
                },
            ],
            category_id: None,
            team_id: None,
            image: None,
        }
    }

    #[test]
    fn test_available_for_size() {
        let product = jersey();
        assert_eq!(product.available_for(Some("M")), Some(4));
        // global counter caps an inconsistent size counter
        assert_eq!(product.available_for(Some("L")), Some(10));
        assert_eq!(product.available_for(Some("XS")), None);
        assert_eq!(product.available_for(None), Some(10));
    }

    #[test]
    fn test_is_available() {
        let mut product = jersey();
        assert!(product.is_available());
        product.stock_quantity = 0;
        assert!(!product.is_available());
        product.stock_quantity = 5;
        product.status = ProductStatus::Draft;
        assert!(!product.is_available());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ProductStatus::parse("active"), ProductStatus::Active);
        assert_eq!(ProductStatus::parse("archived"), ProductStatus::Archived);
        assert_eq!(ProductStatus::parse("???"), ProductStatus::Draft);
    }
}
