//! # till-core: Pure Business Logic for Till POS
//!
//! This crate holds the pricing rules of Till POS as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer (external collaborator)                 │   │
//! │  │     subtotal ──► add order ──► order detail ──► order list      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 till-engine (cache, pricing, aggregation)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ discount  │  │  receipt  │  │   │
//! │  │   │  Product  │  │   Money   │  │ PERCENT   │  │  S482Q    │  │   │
//! │  │   │  Order    │  │           │  │ BUY_N     │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Discount, Order, ResolvedLine, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`discount`] - Line pricing under PERCENT / BUY_N rules
//! - [`receipt`] - Human-facing receipt codes
//! - [`error`] - Domain error types
//! - [`validation`] - Request shape validation
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::discount::price_line;
//! use till_core::{Discount, DiscountKind, Money};
//!
//! let ten_percent = Discount {
//!     id: 1,
//!     kind: DiscountKind::Percent,
//!     qty: 1,
//!     result: 10,
//!     expired_at: None,
//! };
//!
//! let line = price_line(Money::from_cents(1000), 2, Some(&ten_percent));
//! assert_eq!(line.normal.cents(), 2000);
//! assert_eq!(line.final_price.cents(), 1800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod money;
pub mod receipt;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines accepted in a single order request.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_LINE_QUANTITY: i64 = 999;
