//! # Domain Types
//!
//! Core domain types used throughout Till POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │──►│    Discount     │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  kind           │   │  id (i64)       │       │
//! │  │  price_cents    │   │  qty threshold  │   │  receipt_id     │       │
//! │  │  stock          │   │  result         │   │  total_price    │       │
//! │  └────────┬────────┘   └─────────────────┘   └────────┬────────┘       │
//! │           │ priced by the engine                      │                │
//! │           ▼                                           ▼                │
//! │  ┌─────────────────┐                        ┌─────────────────┐       │
//! │  │  ResolvedLine   │───────────────────────►│   OrderDetail   │       │
//! │  │  qty, totals    │                        │ + Cashier       │       │
//! │  │  remaining      │                        │ + Payment       │       │
//! │  └─────────────────┘                        └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! JSON field names are camelCase; these shapes are what the HTTP layer
//! serializes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Category
// =============================================================================

/// Product category (read-only reference for this core).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

// =============================================================================
// Discount
// =============================================================================

/// Discount rule type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum DiscountKind {
    /// `result` is a percentage taken off the line's normal price.
    #[serde(rename = "PERCENT")]
    Percent,
    /// Buying at least `qty` units takes `qty × result` off the line.
    #[serde(rename = "BUY_N")]
    BuyN,
}

impl DiscountKind {
    /// Wire/storage name of the rule type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percent => "PERCENT",
            DiscountKind::BuyN => "BUY_N",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENT" => Ok(DiscountKind::Percent),
            "BUY_N" => Ok(DiscountKind::BuyN),
            other => Err(CoreError::UnknownDiscountType(other.to_string())),
        }
    }
}

/// A discount attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Discount {
    pub id: i64,

    #[serde(rename = "type")]
    pub kind: DiscountKind,

    /// Threshold quantity (BUY_N) or unused (PERCENT).
    pub qty: i64,

    /// Percentage points (PERCENT) or per-unit amount off (BUY_N).
    pub result: i64,

    #[ts(as = "Option<String>")]
    pub expired_at: Option<DateTime<Utc>>,
}

impl Discount {
    /// Whether the discount still applies at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expired_at {
            Some(expiry) => now < expiry,
            None => true,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: i64,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub sku: String,

    pub image: String,

    /// Unit price in minor currency units.
    pub price_cents: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    pub discount_id: Option<i64>,

    pub category_id: Option<i64>,

    /// Resolved discount row, when `discount_id` is set.
    pub discount: Option<Discount>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units can be taken from stock.
    pub fn can_fulfil(&self, quantity: i64) -> bool {
        quantity <= self.stock
    }
}

// =============================================================================
// Order Requests
// =============================================================================

/// One requested line: a product and how many of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub qty: i64,
}

impl OrderLineRequest {
    pub fn new(product_id: i64, qty: i64) -> Self {
        OrderLineRequest { product_id, qty }
    }
}

/// Request to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AddOrderRequest {
    pub payment_id: i64,

    #[serde(default)]
    pub cashier_id: Option<i64>,

    pub total_paid: i64,

    pub products: Vec<OrderLineRequest>,
}

// =============================================================================
// Resolved Line
// =============================================================================

/// A requested line after price, discount and stock resolution.
///
/// Uses the snapshot pattern: name and price are frozen at the time the
/// order is priced, so history survives later product edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResolvedLine {
    pub product_id: i64,
    pub name: String,
    pub sku: String,
    pub unit_price: Money,
    pub discount: Option<Discount>,
    pub qty: i64,
    pub total_normal_price: Money,
    pub total_final_price: Money,

    /// Stock left after this line is taken. `None` for lines read back from
    /// order history.
    pub remaining_stock: Option<i64>,
}

impl ResolvedLine {
    /// Discount id carried by the line, if any.
    pub fn discount_id(&self) -> Option<i64> {
        self.discount.as_ref().map(|d| d.id)
    }

    /// Folds another line for the same product into this one.
    pub fn merge(&mut self, other: ResolvedLine) {
        debug_assert_eq!(self.product_id, other.product_id);
        self.qty += other.qty;
        self.total_normal_price += other.total_normal_price;
        self.total_final_price += other.total_final_price;
        if other.remaining_stock.is_some() {
            self.remaining_stock = other.remaining_stock;
        }
    }
}

/// Output of pricing a set of requested lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedOrder {
    pub lines: Vec<ResolvedLine>,

    /// Sum of every line's final price.
    pub total_price: Money,
}

impl PricedOrder {
    /// Builds the priced order, totalling the final prices.
    pub fn from_lines(lines: Vec<ResolvedLine>) -> Self {
        let total_price = lines.iter().map(|l| l.total_final_price).sum();
        PricedOrder { lines, total_price }
    }

    /// Checks if no line survived resolution.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Cashier & Payment
// =============================================================================

/// A cashier. The default value is the "empty" record substituted when an
/// order carries no attributed cashier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cashier {
    pub id: i64,
    pub name: String,
}

/// Payment method category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentKind {
    #[serde(rename = "CASH")]
    Cash,
    #[serde(rename = "E-WALLET")]
    EWallet,
    #[serde(rename = "EDC")]
    Edc,
}

impl PaymentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Cash => "CASH",
            PaymentKind::EWallet => "E-WALLET",
            PaymentKind::Edc => "EDC",
        }
    }
}

impl FromStr for PaymentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentKind::Cash),
            "E-WALLET" => Ok(PaymentKind::EWallet),
            "EDC" => Ok(PaymentKind::Edc),
            other => Err(CoreError::UnknownPaymentType(other.to_string())),
        }
    }
}

/// A payment method. The default value is the "empty" record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Payment {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<PaymentKind>,
    pub logo: String,
}

// =============================================================================
// Order
// =============================================================================

/// A persisted order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: i64,
    pub payment_id: i64,
    pub cashier_id: Option<i64>,
    pub total_paid: Money,
    pub total_price: Money,

    /// Change handed back: `total_paid - total_price`.
    pub total_return: Money,

    /// Human-facing receipt code, e.g. `S482Q`.
    pub receipt_id: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// An order header that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub payment_id: i64,
    pub cashier_id: Option<i64>,
    pub total_paid: Money,
    pub total_price: Money,
    pub total_return: Money,
    pub receipt_id: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Builds a header, computing the change from paid and price.
    pub fn new(
        payment_id: i64,
        cashier_id: Option<i64>,
        total_paid: Money,
        total_price: Money,
        receipt_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        NewOrder {
            payment_id,
            cashier_id,
            total_paid,
            total_price,
            total_return: total_paid - total_price,
            receipt_id,
            created_at,
        }
    }

    /// Attaches the store-assigned id.
    pub fn into_order(self, id: i64) -> Order {
        Order {
            id,
            payment_id: self.payment_id,
            cashier_id: self.cashier_id,
            total_paid: self.total_paid,
            total_price: self.total_price,
            total_return: self.total_return,
            receipt_id: self.receipt_id,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Composite order view: header, who rang it up, how it was paid, and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub order: Order,

    pub cashier: Cashier,

    #[serde(rename = "payment_type")]
    pub payment: Payment,

    pub products: Vec<ResolvedLine>,
}

/// Order header with who rang it up and how it was paid, as shown in the
/// order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    pub order: Order,

    pub cashier: Cashier,

    #[serde(rename = "payment_type")]
    pub payment: Payment,
}

// =============================================================================
// Unit Tests
// =============================================================================
