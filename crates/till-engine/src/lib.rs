//! # till-engine: Pricing & Inventory Engine for Till POS
//!
//! This crate owns the live side of the point of sale: the shared product
//! cache, stock persistence, order pricing and the composite order views.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   OrderService (entry point)                     │  │
//! │  │   subtotal │ add_order │ order_detail │ list_orders               │  │
//! │  └───────┬────────────────────────────────────────┬─────────────────┘  │
//! │          │                                        │                     │
//! │          ▼                                        ▼                     │
//! │  ┌────────────────┐                     ┌────────────────────────┐     │
//! │  │ PricingEngine  │                     │   OrderAggregator      │     │
//! │  │                │                     │                        │     │
//! │  │ Resolve lines  │                     │ Header, cashier,       │     │
//! │  │ Apply discount │                     │ payment and lines      │     │
//! │  │ Take stock     │                     │ fetched concurrently   │     │
//! │  └───┬────────┬───┘                     └───────────┬────────────┘     │
//! │      │        │                                     │                   │
//! │      ▼        ▼                                     │                   │
//! │  ┌────────┐ ┌──────────────┐                        │                   │
//! │  │ Product│ │ StockFlusher │                        │                   │
//! │  │ Cache  │ │ (bg worker)  │                        │                   │
//! │  └────────┘ └──────┬───────┘                        │                   │
//! │                    │                                │                   │
//! │  ┌─────────────────▼────────────────────────────────▼───────────────┐  │
//! │  │  Store traits: ProductStore, OrderStore, CashierStore,           │  │
//! │  │                PaymentStore (till_db::Database implements all)   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - `OrderService`: orders, receipts and catalog writes
//! - [`pricing`] - Line resolution, discounts, stock consumption
//! - [`cache`] - Concurrent product cache with atomic stock take
//! - [`flush`] - Background or synchronous stock persistence
//! - [`aggregator`] - Order detail and order list assembly
//! - [`store`] - Store traits and the SQLite adapter
//! - [`config`] - `till.toml` and `TILL_*` environment overrides
//! - [`error`] - `OrderError`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_engine::{EngineConfig, OrderLookup, OrderService};
//!
//! let config = EngineConfig::load_or_default(None);
//! let service = OrderService::bootstrap(&config).await?;
//!
//! let detail = service.add_order(request).await?;
//! let again = service
//!     .order_detail(OrderLookup::ReceiptCode(detail.order.receipt_id))
//!     .await?;
//!
//! service.shutdown().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod flush;
pub mod pricing;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregator::{OrderAggregator, OrderLookup};
pub use cache::{Consume, ProductCache};
pub use config::EngineConfig;
pub use error::{OrderError, OrderResult};
pub use flush::{FlushMode, StockFlusher};
pub use pricing::{PricingEngine, PricingMode};
pub use service::OrderService;
pub use store::{CashierStore, OrderStore, PaymentStore, ProductStore};
