//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Port adapter (storefront-engine::sqlite)                               │
//! │       │                                                                 │
//! │       │  db.products().adjust_stock("prod-1", Some("M"), -2)            │
//! │       ▼                                                                 │
//! │  ProductRepository                                                      │
//! │  ├── get(&self, id)                                                     │
//! │  ├── get_many(&self, ids)                                               │
//! │  ├── insert(&self, product)                                             │
//! │  └── adjust_stock(&self, id, size, delta)                               │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product snapshots and atomic stock counters
//! - [`CouponRepository`](coupon::CouponRepository) - Coupon rules, usage counts, redemptions
//! - [`CartRepository`](cart::CartRepository) - Versioned cart documents
//! - [`OrderRepository`](order::OrderRepository) - Versioned order documents
//! - [`WalletRepository`](wallet::WalletRepository) - Balances and the transaction ledger

pub mod cart;
pub mod coupon;
pub mod order;
pub mod product;
pub mod wallet;

/// Helper to generate a new row ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
