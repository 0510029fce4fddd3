//! # Pricing Engine
//!
//! Turns requested `(productId, qty)` lines into priced, stock-checked
//! lines.
//!
//! ## Per-Line Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request line (id, qty)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cache.get(id) ── miss ──► store product ──► store discount            │
//! │       │                         │ (None: skip line)                     │
//! │       │◄── insert_if_absent ────┘                                       │
//! │       ▼                                                                 │
//! │  qty > stock? ──► skip line                                            │
//! │       │                                                                 │
//! │       ├─ Preview: qty > stock - claimed by earlier lines? ──► skip      │
//! │       ▼ Commit                                                          │
//! │  cache.try_consume(id, qty) ── Insufficient ──► skip line              │
//! │       │ Consumed(snapshot)                                              │
//! │       ▼                                                                 │
//! │  flusher.persist(id)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price_line(unit, qty, active discount)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//!  all lines ──► merge duplicate product ids ──► PricedOrder { total }
//! ```
//!
//! A store failure aborts the whole call. In commit mode, stock taken by
//! earlier lines of the same call is given back before the error returns.
//!
//! Preview never touches the cache, so it keeps its own tally of what
//! earlier lines of the call claimed. A repeated product id is accepted in
//! preview exactly when commit would accept it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use till_core::discount::{effective_discount, price_line};
use till_core::{OrderLineRequest, PricedOrder, Product, ResolvedLine};
use tracing::{debug, warn};

use crate::cache::{Consume, ProductCache};
use crate::error::OrderResult;
use crate::flush::StockFlusher;
use crate::store::ProductStore;

/// Whether pricing may take stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingMode {
    /// Subtotal: stock is checked but never taken.
    Preview,
    /// Order creation: stock is taken from the cache and flushed.
    Commit,
}

/// Prices order lines against the cache and the product store.
#[derive(Clone)]
pub struct PricingEngine {
    cache: ProductCache,
    store: Arc<dyn ProductStore>,
    flusher: StockFlusher,
}

impl fmt::Debug for PricingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PricingEngine")
            .field("cached_products", &self.cache.len())
            .field("flusher", &self.flusher)
            .finish()
    }
}

impl PricingEngine {
    /// Prices against the cache the flusher writes from.
    pub fn new(store: Arc<dyn ProductStore>, flusher: StockFlusher) -> Self {
        PricingEngine {
            cache: flusher.cache().clone(),
            store,
            flusher,
        }
    }

    pub fn cache(&self) -> &ProductCache {
        &self.cache
    }

    pub fn flusher(&self) -> &StockFlusher {
        &self.flusher
    }

    /// Resolves, prices and merges `lines`.
    ///
    /// Lines for unknown products or with too little stock are left out of
    /// the result; they are not errors.
    pub async fn price_order(
        &self,
        lines: &[OrderLineRequest],
        mode: PricingMode,
    ) -> OrderResult<PricedOrder> {
        let now = Utc::now();
        let mut resolved = Vec::with_capacity(lines.len());
        let mut claimed: HashMap<i64, i64> = HashMap::new();

        for line in lines {
            match self.resolve_line(line, mode, now, &mut claimed).await {
                Ok(Some(priced)) => resolved.push(priced),
                Ok(None) => {}
                Err(e) => {
                    if mode == PricingMode::Commit {
                        self.release(&resolved).await;
                    }
                    return Err(e);
                }
            }
        }

        let priced = PricedOrder::from_lines(merge_lines(resolved));
        debug!(
            lines = priced.lines.len(),
            total_price = priced.total_price.cents(),
            ?mode,
            "Order priced"
        );
        Ok(priced)
    }

    /// Gives back the stock taken for `lines` and flushes the restored
    /// levels.
    ///
    /// Used when an order cannot be stored after pricing committed it.
    pub async fn release(&self, lines: &[ResolvedLine]) {
        for line in lines {
            if self.cache.restock(line.product_id, line.qty).is_none() {
                warn!(product_id = line.product_id, "Cannot release stock for uncached product");
                continue;
            }
            if let Err(e) = self.flusher.persist(line.product_id).await {
                warn!(product_id = line.product_id, error = %e, "Failed to persist released stock");
            }
        }
    }

    async fn resolve_line(
        &self,
        line: &OrderLineRequest,
        mode: PricingMode,
        now: DateTime<Utc>,
        claimed: &mut HashMap<i64, i64>,
    ) -> OrderResult<Option<ResolvedLine>> {
        let product_id = line.product_id;
        let qty = line.qty;

        let Some(product) = self.lookup(product_id).await? else {
            debug!(product_id, "Product not found, skipping line");
            return Ok(None);
        };

        if !product.can_fulfil(qty) {
            debug!(product_id, qty, stock = product.stock, "Insufficient stock, skipping line");
            return Ok(None);
        }

        let (product, remaining) = match mode {
            PricingMode::Preview => {
                let taken = claimed.entry(product_id).or_insert(0);
                let available = product.stock - *taken;
                if qty > available {
                    debug!(product_id, qty, available, "Stock claimed by earlier lines, skipping line");
                    return Ok(None);
                }
                *taken += qty;
                (product, available - qty)
            }
            PricingMode::Commit => match self.cache.try_consume(product_id, qty) {
                Consume::Consumed(snapshot) => {
                    if let Err(e) = self.flusher.persist(product_id).await {
                        self.cache.restock(product_id, qty);
                        // a concurrent write may already carry our decrement
                        if let Err(retry) = self.flusher.persist(product_id).await {
                            warn!(product_id, error = %retry, "Failed to persist returned stock");
                        }
                        return Err(e.into());
                    }
                    let remaining = snapshot.stock;
                    (snapshot, remaining)
                }
                Consume::Insufficient { available } => {
                    debug!(product_id, qty, available, "Stock taken concurrently, skipping line");
                    return Ok(None);
                }
                Consume::Missing => {
                    warn!(product_id, "Product left the cache mid-order, skipping line");
                    return Ok(None);
                }
            },
        };

        let unit_price = product.price();
        let discount = effective_discount(product.discount.as_ref(), now).cloned();
        let price = price_line(unit_price, qty, discount.as_ref());

        Ok(Some(ResolvedLine {
            product_id,
            name: product.name,
            sku: product.sku,
            unit_price,
            discount,
            qty,
            total_normal_price: price.normal,
            total_final_price: price.final_price,
            remaining_stock: Some(remaining),
        }))
    }

    /// Cache first; on a miss, read through to the store.
    async fn lookup(&self, id: i64) -> OrderResult<Option<Product>> {
        if let Some(product) = self.cache.get(id) {
            return Ok(Some(product));
        }

        let Some(mut product) = self.store.get_product_by_id(id).await? else {
            return Ok(None);
        };

        if product.discount.is_none() {
            if let Some(discount_id) = product.discount_id {
                product.discount = self.store.get_discount_by_id(discount_id).await?;
            }
        }

        debug!(product_id = id, "Product cache filled from store");
        Ok(Some(self.cache.insert_if_absent(product)))
    }
}

/// Folds lines for the same product into one, keeping first-seen order.
fn merge_lines(lines: Vec<ResolvedLine>) -> Vec<ResolvedLine> {
    let mut merged: Vec<ResolvedLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<i64, usize> = HashMap::with_capacity(lines.len());

    for line in lines {
        match index.get(&line.product_id) {
            Some(&at) => merged[at].merge(line),
            None => {
                index.insert(line.product_id, merged.len());
                merged.push(line);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::flush::FlushMode;
    use crate::testing::{buy_n, percent, product, FakeStore};

    fn engine(store: &Arc<FakeStore>, mode: FlushMode) -> PricingEngine {
        let flusher = StockFlusher::start(mode, ProductCache::new(), store.clone());
        PricingEngine::new(store.clone(), flusher)
    }

    fn req(product_id: i64, qty: i64) -> OrderLineRequest {
        OrderLineRequest::new(product_id, qty)
    }

    #[tokio::test]
    async fn test_percent_discount_line() {
        let store = Arc::new(FakeStore::new());
        let mut p = product(1, 1000, 10);
        p.discount = Some(percent(1, 10));
        store.add_product(p);

        let priced = engine(&store, FlushMode::Background)
            .price_order(&[req(1, 2)], PricingMode::Preview)
            .await
            .unwrap();

        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.lines[0].total_normal_price.cents(), 2000);
        assert_eq!(priced.lines[0].total_final_price.cents(), 1800);
        assert_eq!(priced.total_price.cents(), 1800);
    }

    #[tokio::test]
    async fn test_buy_n_threshold() {
        let store = Arc::new(FakeStore::new());
        let mut p = product(1, 1000, 10);
        p.discount = Some(buy_n(2, 3, 500));
        store.add_product(p);
        let engine = engine(&store, FlushMode::Background);

        let met = engine.price_order(&[req(1, 3)], PricingMode::Preview).await.unwrap();
        assert_eq!(met.total_price.cents(), 1500);

        let missed = engine.price_order(&[req(1, 2)], PricingMode::Preview).await.unwrap();
        assert_eq!(missed.total_price.cents(), 2000);
    }

    #[tokio::test]
    async fn test_expired_discount_not_applied() {
        let store = Arc::new(FakeStore::new());
        let mut p = product(1, 1000, 10);
        let mut d = percent(1, 50);
        d.expired_at = Some(Utc::now() - chrono::Duration::days(1));
        p.discount = Some(d);
        store.add_product(p);

        let priced = engine(&store, FlushMode::Background)
            .price_order(&[req(1, 1)], PricingMode::Preview)
            .await
            .unwrap();
        assert_eq!(priced.total_price.cents(), 1000);
        assert!(priced.lines[0].discount.is_none());
    }

    #[tokio::test]
    async fn test_unknown_product_skipped() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 10));

        let priced = engine(&store, FlushMode::Background)
            .price_order(&[req(404, 1), req(1, 1)], PricingMode::Preview)
            .await
            .unwrap();

        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.lines[0].product_id, 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_skipped() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 1));
        let engine = engine(&store, FlushMode::Background);

        let priced = engine.price_order(&[req(1, 2)], PricingMode::Commit).await.unwrap();
        assert!(priced.is_empty());
        assert_eq!(engine.cache().get(1).unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_duplicates_merged() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 10));
        store.add_product(product(2, 500, 10));

        let priced = engine(&store, FlushMode::Background)
            .price_order(&[req(1, 1), req(2, 1), req(1, 2)], PricingMode::Commit)
            .await
            .unwrap();

        let ids: Vec<i64> = priced.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(priced.lines[0].qty, 3);
        assert_eq!(priced.lines[0].total_normal_price.cents(), 3000);
        assert_eq!(priced.lines[0].remaining_stock, Some(7));
        assert_eq!(priced.total_price.cents(), 3500);
    }

    #[tokio::test]
    async fn test_preview_duplicates_respect_stock() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 5));
        let engine = engine(&store, FlushMode::Background);

        // 3 + 3 would oversell a stock of 5; the second line is dropped
        let preview = engine
            .price_order(&[req(1, 3), req(1, 3)], PricingMode::Preview)
            .await
            .unwrap();
        assert_eq!(preview.lines.len(), 1);
        assert_eq!(preview.lines[0].qty, 3);
        assert_eq!(preview.total_price.cents(), 3000);
        assert_eq!(preview.lines[0].remaining_stock, Some(2));

        let fits = engine
            .price_order(&[req(1, 2), req(1, 2)], PricingMode::Preview)
            .await
            .unwrap();
        assert_eq!(fits.lines[0].qty, 4);
        assert_eq!(fits.lines[0].remaining_stock, Some(1));

        // commit agrees with the preview
        let committed = engine
            .price_order(&[req(1, 3), req(1, 3)], PricingMode::Commit)
            .await
            .unwrap();
        assert_eq!(committed.lines[0].qty, preview.lines[0].qty);
        assert_eq!(committed.total_price, preview.total_price);
        assert_eq!(committed.lines[0].remaining_stock, Some(2));
    }

    #[tokio::test]
    async fn test_preview_leaves_stock_alone() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 5));
        let engine = engine(&store, FlushMode::Background);

        let priced = engine.price_order(&[req(1, 2)], PricingMode::Preview).await.unwrap();
        assert_eq!(priced.lines[0].remaining_stock, Some(3));

        engine.flusher().drain().await;
        assert_eq!(engine.cache().get(1).unwrap().stock, 5);
        assert!(store.stock_writes().is_empty());
    }

    #[tokio::test]
    async fn test_commit_decrements_cache_and_flushes() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 5));
        let engine = engine(&store, FlushMode::Background);

        engine.price_order(&[req(1, 2)], PricingMode::Commit).await.unwrap();
        // visible immediately, before the flush lands
        assert_eq!(engine.cache().get(1).unwrap().stock, 3);

        engine.flusher().drain().await;
        assert_eq!(store.stored_stock(1), Some(3));
    }

    #[tokio::test]
    async fn test_read_through_fetches_discount_once() {
        let store = Arc::new(FakeStore::new());
        let mut p = product(1, 1000, 10);
        p.discount = Some(percent(7, 10));
        store.add_product(p);
        let engine = engine(&store, FlushMode::Background);

        engine.price_order(&[req(1, 1)], PricingMode::Preview).await.unwrap();
        engine.price_order(&[req(1, 1)], PricingMode::Preview).await.unwrap();

        assert_eq!(store.product_reads(), 1);
        assert_eq!(engine.cache().get(1).unwrap().discount.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_and_releases() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 5));
        let engine = engine(&store, FlushMode::Background);
        engine.cache().set(product(1, 1000, 5));
        store.fail_product_reads();

        // line 1 is cached and consumed, line 2 misses and the store read fails
        let err = engine
            .price_order(&[req(1, 2), req(2, 1)], PricingMode::Commit)
            .await
            .unwrap_err();

        assert!(matches!(err, crate::OrderError::Store(_)));
        assert_eq!(engine.cache().get(1).unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_synchronous_flush_failure_rolls_back() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 5));
        let engine = engine(&store, FlushMode::Synchronous);
        engine.cache().set(product(1, 1000, 5));
        store.fail_stock_writes();

        let err = engine
            .price_order(&[req(1, 2)], PricingMode::Commit)
            .await
            .unwrap_err();

        assert!(matches!(err, crate::OrderError::Store(_)));
        assert_eq!(engine.cache().get(1).unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_release_returns_stock() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 5));
        let engine = engine(&store, FlushMode::Background);

        let priced = engine.price_order(&[req(1, 4)], PricingMode::Commit).await.unwrap();
        assert_eq!(engine.cache().get(1).unwrap().stock, 1);

        engine.release(&priced.lines).await;
        engine.flusher().drain().await;

        assert_eq!(engine.cache().get(1).unwrap().stock, 5);
        assert_eq!(store.stored_stock(1), Some(5));
    }

    #[tokio::test]
    async fn test_synchronous_concurrent_orders_leave_store_at_cache_level() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 5));
        store.delay_stock_write(4, Duration::from_millis(50));
        let engine = engine(&store, FlushMode::Synchronous);
        engine.cache().set(product(1, 1000, 5));

        // the first order's write of 4 stalls while the second takes stock
        let order_a = [req(1, 1)];
        let order_b = [req(1, 1)];
        let (a, b) = tokio::join!(
            engine.price_order(&order_a, PricingMode::Commit),
            engine.price_order(&order_b, PricingMode::Commit),
        );
        assert_eq!(a.unwrap().lines.len(), 1);
        assert_eq!(b.unwrap().lines.len(), 1);

        assert_eq!(engine.cache().get(1).unwrap().stock, 3);
        assert_eq!(store.stored_stock(1), Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_for_last_unit() {
        let store = Arc::new(FakeStore::new());
        store.add_product(product(1, 1000, 1));
        let engine = engine(&store, FlushMode::Background);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .price_order(&[req(1, 1)], PricingMode::Commit)
                    .await
                    .unwrap()
            }));
        }

        let mut filled = 0;
        for handle in handles {
            if !handle.await.unwrap().is_empty() {
                filled += 1;
            }
        }

        assert_eq!(filled, 1);
        assert_eq!(engine.cache().get(1).unwrap().stock, 0);
        engine.flusher().drain().await;
        assert_eq!(store.stored_stock(1), Some(0));
    }
}
