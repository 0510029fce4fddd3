//! # Discount Rules
//!
//! Prices a single order line under the product's discount rule.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  normal = unit_price × qty                                              │
//! │                                                                         │
//! │  PERCENT  final = normal - trunc(normal × result / 100)                 │
//! │                                                                         │
//! │  BUY_N    qty ≥ threshold  → final = normal - threshold × result        │
//! │           qty < threshold  → final = normal                             │
//! │                                                                         │
//! │  none / expired            → final = normal                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A BUY_N rule only takes `threshold × result` off once per line, however
//! far past the threshold the quantity goes. A discount never takes a line
//! below zero.

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::types::{Discount, DiscountKind};

/// Normal and discounted totals for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePrice {
    pub normal: Money,
    pub final_price: Money,
}

impl LinePrice {
    /// Amount taken off by the discount.
    pub fn savings(&self) -> Money {
        self.normal - self.final_price
    }
}

/// Prices `qty` units at `unit_price` under `discount`.
///
/// Expiry is not checked here; use [`effective_discount`] first when the
/// rule may have lapsed.
pub fn price_line(unit_price: Money, qty: i64, discount: Option<&Discount>) -> LinePrice {
    let normal = unit_price * qty;

    let final_price = match discount {
        Some(d) => match d.kind {
            DiscountKind::Percent => normal - normal.percent_of(d.result),
            DiscountKind::BuyN if qty >= d.qty => normal - Money::from_cents(d.qty * d.result),
            DiscountKind::BuyN => normal,
        },
        None => normal,
    };
    let final_price = final_price.max(Money::zero());

    LinePrice {
        normal,
        final_price,
    }
}

/// Drops a discount that has expired by `now`.
pub fn effective_discount(discount: Option<&Discount>, now: DateTime<Utc>) -> Option<&Discount> {
    discount.filter(|d| d.is_active_at(now))
}

// =============================================================================
// Unit Tests
// =============================================================================
