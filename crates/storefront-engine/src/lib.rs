//! # storefront-engine: Order Lifecycle Orchestration
//!
//! Runs the pure rules of storefront-core against the outside world:
//! catalog stock, coupon directory, wallet ledger, order and cart stores,
//! and customer notifications.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Order Engine                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            ★ storefront-engine (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐           │   │
//! │  │  │   cart   │ │ checkout │ │  orders  │ │  notify  │           │   │
//! │  │  │ coupons  │ │  builder │ │lifecycle │ │ dispatch │           │   │
//! │  │  └────┬─────┘ └────┬─────┘ └────┬─────┘ └────┬─────┘           │   │
//! │  │       └────────────┴─────┬──────┴────────────┘                 │   │
//! │  │                    ports (async traits)                         │   │
//! │  │               ┌──────────┴──────────┐                          │   │
//! │  │           memory::*            sqlite::SqliteBackend            │   │
//! │  └───────────────────────────────────────┬─────────────────────────┘   │
//! │                                          │                              │
//! │  ┌───────────────────────────┐  ┌────────▼──────────────────┐          │
//! │  │      storefront-core      │  │      storefront-db        │          │
//! │  └───────────────────────────┘  └───────────────────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - `OrderEngine` and its collaborator bundle
//! - [`cart`] - Cart mutations and coupon verification
//! - [`checkout`] - Order Builder (`place_order`)
//! - [`orders`] - Item transitions, order cancellation, returns
//! - [`ports`] - Collaborator traits
//! - [`locks`] - Per-order / per-cart async locks
//! - [`notify`] - Fire-and-forget customer notices
//! - [`memory`] - In-memory collaborators
//! - [`sqlite`] - SQLite collaborators over storefront-db
//! - [`config`] - Engine configuration
//! - [`error`] - Engine and port errors
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_engine::{EngineConfig, LogNotifier, OrderEngine, SqliteBackend};
//! use storefront_db::Database;
//!
//! let config = EngineConfig::load(Some("storefront.toml".as_ref()))?;
//! let db = Database::new(config.db_config()).await?;
//! let backend = SqliteBackend::new(db);
//! let engine = OrderEngine::new(backend.backends(Arc::new(LogNotifier)), config);
//!
//! engine.add_to_cart("u1", "blues-home-jersey", "M", 2).await?;
//! engine.apply_coupon("u1", "SAVE10").await?;
//! let order = engine.place_order(request).await?;
//! ```

pub mod cart;
pub mod checkout;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod memory;
pub mod notify;
pub mod orders;
pub mod ports;
pub mod sqlite;

pub use checkout::PlaceOrderRequest;
pub use config::{ConfigError, EngineConfig};
pub use engine::{Backends, OrderEngine};
pub use error::{EngineError, EngineResult, ErrorBody, ErrorCode, PortError, PortResult};
pub use memory::MemoryBackend;
pub use notify::{ItemStatusNotice, LogNotifier, NotificationDispatcher, RecordingNotifier};
pub use orders::{CancelOutcome, TransitionOutcome};
pub use sqlite::SqliteBackend;
