//! # Order Service
//!
//! Entry point for the operations the HTTP layer exposes: pricing and
//! placing orders, order views, receipt downloads and catalog writes.
//!
//! ## Add Order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AddOrderRequest                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate ──► price_order(Commit) ──► no lines? ──► EmptyOrder         │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  NewOrder { receipt code, totalReturn = paid - price }                 │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  place_order(header + lines) ── receipt collision ──► new code, retry  │
//! │                      │         ── other failure ────► release stock    │
//! │                      ▼                                                  │
//! │  enrich(cashier, payment) ──► OrderDetail                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Catalog writes go to the store first and reach the cache only once the
//! store accepted them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use till_core::receipt::new_receipt_code;
use till_core::validation::{
    validate_add_order, validate_id, validate_order_lines, validate_product,
};
use till_core::{
    AddOrderRequest, Money, NewOrder, Order, OrderDetail, OrderLineRequest, OrderSummary,
    PricedOrder, Product, ResolvedLine, ValidationError,
};
use till_db::{Database, DbError, DbResult};
use tracing::{info, warn};

use crate::aggregator::{OrderAggregator, OrderLookup};
use crate::cache::ProductCache;
use crate::config::EngineConfig;
use crate::error::{OrderError, OrderResult};
use crate::flush::StockFlusher;
use crate::pricing::{PricingEngine, PricingMode};
use crate::store::{CashierStore, OrderStore, PaymentStore, ProductStore};

/// Attempts at storing an order before a receipt code collision is final.
const RECEIPT_ATTEMPTS: usize = 3;

/// Largest page `list_orders` will return.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct OrderService {
    engine: PricingEngine,
    aggregator: OrderAggregator,
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    detail_timeout: Option<Duration>,
}

impl fmt::Debug for OrderService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderService")
            .field("engine", &self.engine)
            .field("detail_timeout", &self.detail_timeout)
            .finish_non_exhaustive()
    }
}

impl OrderService {
    pub fn new(
        engine: PricingEngine,
        aggregator: OrderAggregator,
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        detail_timeout: Option<Duration>,
    ) -> Self {
        OrderService {
            engine,
            aggregator,
            orders,
            products,
            detail_timeout,
        }
    }

    /// Wires every component to one store that implements all four traits.
    /// Pricing uses the flusher's cache.
    pub fn from_store<S>(
        store: Arc<S>,
        flusher: StockFlusher,
        detail_timeout: Option<Duration>,
    ) -> Self
    where
        S: ProductStore + OrderStore + CashierStore + PaymentStore + 'static,
    {
        let engine = PricingEngine::new(store.clone(), flusher);
        let aggregator = OrderAggregator::new(store.clone(), store.clone(), store.clone());
        OrderService::new(engine, aggregator, store.clone(), store, detail_timeout)
    }

    /// Opens the database, warms the cache and starts the stock flusher.
    pub async fn bootstrap(config: &EngineConfig) -> OrderResult<Self> {
        let db = Arc::new(Database::new(config.db_config()).await?);

        let cache = ProductCache::new();
        if config.engine.warm_cache {
            cache.warm(db.as_ref()).await;
        }

        let cached_products = cache.len();
        let flusher = StockFlusher::start(config.engine.flush_mode, cache, db.clone());

        info!(
            flush_mode = %config.engine.flush_mode,
            cached_products,
            "Order service ready"
        );
        Ok(Self::from_store(db, flusher, config.detail_timeout()))
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    /// Prices `lines` without taking stock.
    pub async fn subtotal(&self, lines: &[OrderLineRequest]) -> OrderResult<PricedOrder> {
        validate_order_lines(lines)?;
        self.engine.price_order(lines, PricingMode::Preview).await
    }

    /// Prices the request, takes the stock and stores the order.
    pub async fn add_order(&self, request: AddOrderRequest) -> OrderResult<OrderDetail> {
        validate_add_order(&request)?;

        let priced = self
            .engine
            .price_order(&request.products, PricingMode::Commit)
            .await?;
        if priced.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let order = match self.store_order(&request, &priced).await {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Order not stored, releasing stock");
                self.engine.release(&priced.lines).await;
                return Err(e.into());
            }
        };

        info!(
            order_id = order.id,
            receipt = %order.receipt_id,
            lines = priced.lines.len(),
            total_price = order.total_price.cents(),
            "Order created"
        );

        // the order is stored; a failed enrichment must not hide that
        let (cashier, payment) = match self.aggregator.enrich(&order).await {
            Ok(found) => found,
            Err(e) => {
                warn!(order_id = order.id, error = %e, "Order enrichment failed");
                Default::default()
            }
        };

        Ok(OrderDetail {
            order,
            cashier,
            payment,
            products: priced.lines,
        })
    }

    /// Full view of one stored order.
    pub async fn order_detail(&self, lookup: OrderLookup) -> OrderResult<OrderDetail> {
        self.aggregator
            .get_order_detail(lookup, self.detail_timeout)
            .await
    }

    pub async fn list_orders(&self, limit: i64, skip: i64) -> OrderResult<Vec<OrderSummary>> {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ValidationError::OutOfRange {
                field: "limit".into(),
                min: 1,
                max: MAX_PAGE_SIZE,
            }
            .into());
        }
        if skip < 0 {
            return Err(ValidationError::OutOfRange {
                field: "skip".into(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        self.aggregator.list_orders(limit, skip).await
    }

    /// Marks the order's receipt as downloaded and returns its file path.
    pub async fn download_receipt(&self, order_id: i64) -> OrderResult<String> {
        validate_id("orderId", order_id)?;
        let path = self
            .orders
            .mark_receipt_downloaded(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))?;

        info!(order_id, "Receipt downloaded");
        Ok(path)
    }

    /// Whether the order's receipt has been downloaded.
    pub async fn receipt_downloaded(&self, order_id: i64) -> OrderResult<bool> {
        validate_id("orderId", order_id)?;
        self.orders
            .receipt_download_status(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    // =========================================================================
    // Catalog Writes
    // =========================================================================

    /// Stores a new product and caches it, so the next order can price it
    /// without a store read.
    pub async fn create_product(&self, product: Product) -> OrderResult<Product> {
        validate_product(&product)?;
        let stored = self.products.create_product(&product).await?;
        let cached = self.with_discount(stored).await?;

        self.engine.cache().set(cached.clone());
        info!(product_id = cached.id, sku = %cached.sku, "Product created");
        Ok(cached)
    }

    /// Rewrites a product and replaces its cached snapshot. The given stock
    /// becomes the live stock level.
    pub async fn update_product(&self, product: Product) -> OrderResult<Product> {
        validate_id("productId", product.id)?;
        validate_product(&product)?;
        self.products
            .update_product(&product)
            .await
            .map_err(|e| product_error(e, product.id))?;
        let cached = self.with_discount(product).await?;

        self.engine.cache().set(cached.clone());
        info!(product_id = cached.id, price = cached.price_cents, stock = cached.stock, "Product updated");
        Ok(cached)
    }

    pub async fn delete_product(&self, id: i64) -> OrderResult<()> {
        validate_id("productId", id)?;
        self.products
            .delete_product(id)
            .await
            .map_err(|e| product_error(e, id))?;

        self.engine.cache().remove(id);
        info!(product_id = id, "Product deleted");
        Ok(())
    }

    /// Waits for queued stock writes and stops the flusher.
    pub async fn shutdown(&self) {
        self.engine.flusher().shutdown().await;
        info!("Order service stopped");
    }

    /// Stores header and lines, drawing a fresh receipt code when the last
    /// one was already taken.
    async fn store_order(&self, request: &AddOrderRequest, priced: &PricedOrder) -> DbResult<Order> {
        let created_at = Utc::now();
        let mut attempt = 1;

        loop {
            let new_order = NewOrder::new(
                request.payment_id,
                request.cashier_id,
                Money::from_cents(request.total_paid),
                priced.total_price,
                new_receipt_code(),
                created_at,
            );

            match self.place(&new_order, &priced.lines).await {
                Err(e) if e.is_unique_violation() && attempt < RECEIPT_ATTEMPTS => {
                    warn!(receipt = %new_order.receipt_id, attempt, "Receipt code taken, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn place(&self, order: &NewOrder, lines: &[ResolvedLine]) -> DbResult<Order> {
        self.orders.place_order(order, lines).await
    }

    /// Attaches the product's discount record, as read-through does.
    async fn with_discount(&self, mut product: Product) -> OrderResult<Product> {
        product.discount = match product.discount_id {
            Some(discount_id) => self.products.get_discount_by_id(discount_id).await?,
            None => None,
        };
        Ok(product)
    }
}

fn product_error(err: DbError, id: i64) -> OrderError {
    match err {
        DbError::NotFound { .. } => OrderError::not_found("Product", id),
        other => other.into(),
    }
}
