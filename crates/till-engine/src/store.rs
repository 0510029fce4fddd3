//! # Store Traits
//!
//! The engine's view of persistence. Every component takes these as
//! `Arc<dyn ...>` so tests can swap the SQLite adapter for an in-memory fake.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PricingEngine ──► ProductStore   (products, discounts, stock writes)  │
//! │  StockFlusher  ──► ProductStore                                         │
//! │  Aggregator    ──► OrderStore + CashierStore + PaymentStore            │
//! │  OrderService  ──► OrderStore (place_order, receipt downloads)         │
//! │                ──► ProductStore (catalog writes)                        │
//! │                                                                         │
//! │  till_db::Database implements all four.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single-row lookups return `Ok(None)` when the row does not exist; `Err`
//! is reserved for the store itself failing.

use async_trait::async_trait;
use till_core::{Cashier, Discount, NewOrder, Order, Payment, Product, ResolvedLine};
use till_db::{Database, DbResult};

// =============================================================================
// Traits
// =============================================================================

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product_by_id(&self, id: i64) -> DbResult<Option<Product>>;

    async fn get_products_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Product>>;

    /// Every product, for warming the cache.
    async fn list_products(&self) -> DbResult<Vec<Product>>;

    /// Stores a new product and returns it with its assigned id.
    async fn create_product(&self, product: &Product) -> DbResult<Product>;

    /// Rewrites every column of an existing product.
    async fn update_product(&self, product: &Product) -> DbResult<()>;

    async fn delete_product(&self, id: i64) -> DbResult<()>;

    /// Overwrites the stored stock level with `stock`.
    async fn update_product_stock(&self, id: i64, stock: i64) -> DbResult<()>;

    async fn get_discount_by_id(&self, id: i64) -> DbResult<Option<Discount>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order_by_id(&self, id: i64) -> DbResult<Option<Order>>;

    async fn get_order_by_receipt_code(&self, code: &str) -> DbResult<Option<Order>>;

    async fn get_ordered_lines_by_order_id(&self, order_id: i64) -> DbResult<Vec<ResolvedLine>>;

    async fn create_order(&self, order: &NewOrder) -> DbResult<Order>;

    async fn create_ordered_lines(&self, order_id: i64, lines: &[ResolvedLine]) -> DbResult<()>;

    /// Stores a header and its lines as a unit.
    ///
    /// The default runs the two writes back to back. Stores that support
    /// transactions override it so a failed line write leaves no header
    /// behind.
    async fn place_order(&self, order: &NewOrder, lines: &[ResolvedLine]) -> DbResult<Order> {
        let stored = self.create_order(order).await?;
        self.create_ordered_lines(stored.id, lines).await?;
        Ok(stored)
    }

    /// Page of order headers, newest first.
    async fn list_orders(&self, limit: i64, skip: i64) -> DbResult<Vec<Order>>;

    /// Flags the order's receipt as downloaded and returns its file path.
    /// `None` when the order does not exist.
    async fn mark_receipt_downloaded(&self, order_id: i64) -> DbResult<Option<String>>;

    async fn receipt_download_status(&self, order_id: i64) -> DbResult<Option<bool>>;
}

#[async_trait]
pub trait CashierStore: Send + Sync {
    async fn get_cashier_by_id(&self, id: i64) -> DbResult<Option<Cashier>>;

    async fn list_cashiers(&self) -> DbResult<Vec<Cashier>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get_payment_by_id(&self, id: i64) -> DbResult<Option<Payment>>;

    async fn list_payments(&self) -> DbResult<Vec<Payment>>;
}

// =============================================================================
// SQLite Adapter
// =============================================================================

#[async_trait]
impl ProductStore for Database {
    async fn get_product_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        self.products().get_by_id(id).await
    }

    async fn get_products_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Product>> {
        self.products().get_by_ids(ids).await
    }

    async fn list_products(&self) -> DbResult<Vec<Product>> {
        self.products().list_all().await
    }

    async fn create_product(&self, product: &Product) -> DbResult<Product> {
        self.products().insert(product).await
    }

    async fn update_product(&self, product: &Product) -> DbResult<()> {
        self.products().update(product).await
    }

    async fn delete_product(&self, id: i64) -> DbResult<()> {
        self.products().delete(id).await
    }

    async fn update_product_stock(&self, id: i64, stock: i64) -> DbResult<()> {
        self.products().update_stock(id, stock).await
    }

    async fn get_discount_by_id(&self, id: i64) -> DbResult<Option<Discount>> {
        self.discounts().get_by_id(id).await
    }
}

#[async_trait]
impl OrderStore for Database {
    async fn get_order_by_id(&self, id: i64) -> DbResult<Option<Order>> {
        self.orders().get_by_id(id).await
    }

    async fn get_order_by_receipt_code(&self, code: &str) -> DbResult<Option<Order>> {
        self.orders().get_by_receipt_code(code).await
    }

    async fn get_ordered_lines_by_order_id(&self, order_id: i64) -> DbResult<Vec<ResolvedLine>> {
        self.orders().get_lines(order_id).await
    }

    async fn create_order(&self, order: &NewOrder) -> DbResult<Order> {
        self.orders().insert(order).await
    }

    async fn create_ordered_lines(&self, order_id: i64, lines: &[ResolvedLine]) -> DbResult<()> {
        self.orders().insert_lines(order_id, lines).await
    }

    async fn place_order(&self, order: &NewOrder, lines: &[ResolvedLine]) -> DbResult<Order> {
        self.orders().place(order, lines).await
    }

    async fn list_orders(&self, limit: i64, skip: i64) -> DbResult<Vec<Order>> {
        self.orders().list(limit, skip).await
    }

    async fn mark_receipt_downloaded(&self, order_id: i64) -> DbResult<Option<String>> {
        self.orders().mark_receipt_downloaded(order_id).await
    }

    async fn receipt_download_status(&self, order_id: i64) -> DbResult<Option<bool>> {
        self.orders().receipt_download_status(order_id).await
    }
}

#[async_trait]
impl CashierStore for Database {
    async fn get_cashier_by_id(&self, id: i64) -> DbResult<Option<Cashier>> {
        self.cashiers().get_by_id(id).await
    }

    async fn list_cashiers(&self) -> DbResult<Vec<Cashier>> {
        self.cashiers().list().await
    }
}

#[async_trait]
impl PaymentStore for Database {
    async fn get_payment_by_id(&self, id: i64) -> DbResult<Option<Payment>> {
        self.payments().get_by_id(id).await
    }

    async fn list_payments(&self) -> DbResult<Vec<Payment>> {
        self.payments().list().await
    }
}
