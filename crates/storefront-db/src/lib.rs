//! # storefront-db: Database Layer for the Storefront Order Engine
//!
//! SQLite persistence for everything the order engine reads and writes:
//! catalog stock, coupons and their redemptions, cart and order documents,
//! and the wallet ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Data Flow                                │
//! │                                                                         │
//! │  OrderEngine::place_order (storefront-engine)                           │
//! │       │  via SqliteBackend port adapters                                │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  storefront-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CouponRepo    │    │ 0001_initial │  │   │
//! │  │   │ Connection    │    │ CartRepo      │    │              │  │   │
//! │  │   │ Management    │    │ OrderRepo     │    │              │  │   │
//! │  │   │               │    │ WalletRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("storefront.db")).await?;
//! let product = db.products().get("prod-1").await?;
//! db.products().adjust_stock("prod-1", Some("M"), -2).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cart::CartRepository;
pub use repository::coupon::CouponRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::wallet::WalletRepository;
