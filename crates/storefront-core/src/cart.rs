//! # Cart Document
//!
//! A per-user cart with active lines, a saved-for-later list and an
//! optional attached coupon.
//!
//! ## The Recalculation Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add / update / remove / save-for-later / move-to-cart                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  recalculate()                                                          │
//! │   ├── total_price        = Σ price × qty over AVAILABLE lines           │
//! │   ├── coupon             = None                                         │
//! │   ├── discount_amount    = 0                                            │
//! │   └── total_after_discount = total_price                               │
//! │                                                                         │
//! │  Only coupon verification re-attaches a discount, so no discount       │
//! │  survives a cart mutation it was not calculated against.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A line is AVAILABLE when its product still exists, is active and has
//! global stock above zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::catalog::ProductSnapshot;
use crate::coupon::CouponQuote;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_line_quantity, validate_size};

/// Products keyed by id, as loaded for one cart operation.
pub type ProductMap = HashMap<String, ProductSnapshot>;

// =============================================================================
// Cart Line
// =============================================================================

/// One (product, size) line in the cart or the saved list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub id: String,
    pub product_id: String,
    pub size: Option<String>,
    pub quantity: u32,
    /// Unit price captured when the line was added.
    pub price: Money,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, size: Option<String>, quantity: u32, price: Money) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.into(),
            size,
            quantity,
            price,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }

    fn same_variant(&self, product_id: &str, size: Option<&str>) -> bool {
        self.product_id == product_id && self.size.as_deref() == size
    }
}

/// A cart line joined with its current product.
#[derive(Debug, Clone, Copy)]
pub struct PricedLine<'a> {
    pub line: &'a CartLine,
    pub product: &'a ProductSnapshot,
}

// =============================================================================
// Cart
// =============================================================================

/// The cart document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub items: Vec<CartLine>,
    pub saved_items: Vec<CartLine>,
    /// Attached coupon id, set only by coupon verification.
    pub coupon_id: Option<String>,
    pub discount_amount: Money,
    /// Subtotal of available lines.
    pub total_price: Money,
    pub total_after_discount: Money,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped by the store on every save.
    pub version: i64,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            items: Vec::new(),
            saved_items: Vec::new(),
            coupon_id: None,
            discount_amount: Money::zero(),
            total_price: Money::zero(),
            total_after_discount: Money::zero(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Product ids referenced by active and saved lines.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .items
            .iter()
            .chain(self.saved_items.iter())
            .map(|l| l.product_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Active lines whose product exists, is active and is in stock.
    pub fn available_lines<'a>(&'a self, products: &'a ProductMap) -> Vec<PricedLine<'a>> {
        self.items
            .iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?;
                product
                    .is_available()
                    .then_some(PricedLine { line, product })
            })
            .collect()
    }

    /// Subtotal over available lines only.
    pub fn available_subtotal(&self, products: &ProductMap) -> Money {
        self.available_lines(products)
            .iter()
            .map(|p| p.line.line_total())
            .sum()
    }

    /// Units over available lines only.
    pub fn available_units(&self, products: &ProductMap) -> u32 {
        self.available_lines(products)
            .iter()
            .map(|p| p.line.quantity)
            .sum()
    }

    /// Recomputes totals from scratch and drops any attached coupon.
    pub fn recalculate(&mut self, products: &ProductMap) {
        self.total_price = self.available_subtotal(products);
        self.clear_coupon();
    }

    /// Detaches the coupon. Totals revert to the subtotal.
    pub fn clear_coupon(&mut self) {
        self.coupon_id = None;
        self.discount_amount = Money::zero();
        self.total_after_discount = self.total_price;
    }

    /// Attaches a verified coupon quote.
    pub fn attach_coupon(&mut self, quote: &CouponQuote) {
        self.coupon_id = Some(quote.coupon_id.clone());
        self.discount_amount = quote.discount_amount;
        self.total_price = quote.subtotal;
        self.total_after_discount = quote.subtotal - quote.discount_amount;
    }

    /// Removes products that no longer exist in the catalog.
    ///
    /// ## Returns
    /// `true` when any line was dropped.
    pub fn prune_missing(&mut self, products: &ProductMap) -> bool {
        let before = self.items.len();
        self.items.retain(|l| products.contains_key(&l.product_id));
        self.items.len() != before
    }

    /// Empties the cart after checkout. Saved items stay.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total_price = Money::zero();
        self.clear_coupon();
    }

    // -------------------------------------------------------------------------
    // Line Mutations
    // -------------------------------------------------------------------------

    /// Adds units of a product size, merging with an existing line.
    ///
    /// ## Rules
    /// - size is required and must exist on the product
    /// - product must be active
    /// - 1 ≤ qty ≤ `max_units`, merged quantity ≤ `max_units`
    /// - merged quantity ≤ size stock
    ///
    /// A new line captures the product's current price.
    pub fn add_line(
        &mut self,
        product: &ProductSnapshot,
        size: &str,
        qty: u32,
        max_units: u32,
    ) -> CoreResult<&CartLine> {
        let size = validate_size(size)?;
        validate_line_quantity(qty, max_units)?;
        ensure_active(product)?;
        let stock = size_stock(product, &size)?;

        let index = match self
            .items
            .iter()
            .position(|l| l.same_variant(&product.id, Some(&size)))
        {
            Some(index) => {
                let merged = self.items[index].quantity + qty;
                ensure_within_cap(merged, max_units)?;
                ensure_stock(product, &size, stock, merged)?;
                self.items[index].quantity = merged;
                index
            }
            None => {
                ensure_stock(product, &size, stock, qty)?;
                self.items
                    .push(CartLine::new(product.id.clone(), Some(size), qty, product.price));
                self.items.len() - 1
            }
        };

        Ok(&self.items[index])
    }

    /// Sets the quantity of an existing line.
    pub fn update_line(
        &mut self,
        line_id: &str,
        qty: u32,
        product: Option<&ProductSnapshot>,
        max_units: u32,
    ) -> CoreResult<()> {
        validate_line_quantity(qty, max_units)?;
        let line = self
            .items
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| CoreError::CartLineNotFound(line_id.to_string()))?;

        if let (Some(product), Some(size)) = (product, line.size.as_deref()) {
            if let Some(stock) = product.size_stock(size) {
                ensure_stock(product, size, stock, qty)?;
            }
        }

        line.quantity = qty;
        Ok(())
    }

    /// Removes an active line. Unknown ids are ignored.
    pub fn remove_line(&mut self, line_id: &str) {
        self.items.retain(|l| l.id != line_id);
    }

    /// Moves an active line into the saved list unchanged.
    pub fn save_for_later(&mut self, line_id: &str) -> CoreResult<()> {
        let index = self
            .items
            .iter()
            .position(|l| l.id == line_id)
            .ok_or_else(|| CoreError::CartLineNotFound(line_id.to_string()))?;
        let line = self.items.remove(index);
        self.saved_items.push(line);
        Ok(())
    }

    /// Moves a saved line back into the cart.
    ///
    /// Re-checks that the product is active, that the size has stock for
    /// the saved quantity and that merging stays within `max_units`.
    /// The line is re-priced at the product's current price.
    pub fn move_to_cart(
        &mut self,
        saved_id: &str,
        product: Option<&ProductSnapshot>,
        max_units: u32,
    ) -> CoreResult<()> {
        let index = self
            .saved_items
            .iter()
            .position(|l| l.id == saved_id)
            .ok_or_else(|| CoreError::CartLineNotFound(saved_id.to_string()))?;
        let saved = &self.saved_items[index];

        let product = match product {
            Some(p) => p,
            None => {
                return Err(CoreError::ItemUnavailable {
                    product_id: saved.product_id.clone(),
                    name: saved.product_id.clone(),
                })
            }
        };
        ensure_active(product)?;

        let size = saved.size.clone().unwrap_or_default();
        let stock = size_stock(product, &size)?;
        ensure_stock(product, &size, stock, saved.quantity)?;

        let existing = self
            .items
            .iter()
            .position(|l| l.same_variant(&product.id, saved.size.as_deref()));
        let current = existing.map_or(0, |i| self.items[i].quantity);
        ensure_within_cap(current + saved.quantity, max_units)?;

        let saved = self.saved_items.remove(index);
        match existing {
            Some(i) => self.items[i].quantity += saved.quantity,
            None => self.items.push(CartLine::new(
                product.id.clone(),
                saved.size,
                saved.quantity,
                product.price,
            )),
        }
        Ok(())
    }

    /// Drops a saved line. Totals are not touched.
    pub fn remove_saved(&mut self, saved_id: &str) {
        self.saved_items.retain(|l| l.id != saved_id);
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn ensure_active(product: &ProductSnapshot) -> CoreResult<()> {
    if product.is_active() {
        Ok(())
    } else {
        Err(CoreError::ItemUnavailable {
            product_id: product.id.clone(),
            name: product.name.clone(),
        })
    }
}

fn size_stock(product: &ProductSnapshot, size: &str) -> CoreResult<i64> {
    product
        .size_stock(size)
        .ok_or_else(|| CoreError::ItemUnavailable {
            product_id: product.id.clone(),
            name: format!("{} (size {})", product.name, size),
        })
}

fn ensure_stock(product: &ProductSnapshot, size: &str, stock: i64, qty: u32) -> CoreResult<()> {
    if qty as i64 > stock {
        return Err(CoreError::InsufficientStock {
            name: product.name.clone(),
            size: Some(size.to_string()),
            available: stock,
            requested: qty,
        });
    }
    Ok(())
}

fn ensure_within_cap(qty: u32, max_units: u32) -> CoreResult<()> {
    if qty > max_units {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: max_units as i64,
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
