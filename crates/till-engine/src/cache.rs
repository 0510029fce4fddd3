//! # Product Cache
//!
//! In-memory mirror of the product catalog, keyed by product id. It is the
//! authority for live stock: pricing reads and decrements stock here, and
//! the store catches up through the stock flusher.
//!
//! ## Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DashMap<i64, Product>  (sharded; one lock per shard)                  │
//! │                                                                         │
//! │  order A: try_consume(7, 1) ──┐                                        │
//! │                               ├── shard write lock for key 7           │
//! │  order B: try_consume(7, 1) ──┘   check stock ≥ qty, then decrement    │
//! │                                   under the same lock                  │
//! │                                                                         │
//! │  stock 1 → exactly one of A/B gets Consumed, the other Insufficient    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries leave only when the product is deleted. The cache never calls the
//! store; read-through lives in the pricing engine.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use till_core::Product;
use tracing::{debug, error, info};

use crate::store::ProductStore;

/// Outcome of [`ProductCache::try_consume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consume {
    /// Stock was taken; the snapshot carries the new stock level.
    Consumed(Product),
    /// Not enough stock; nothing changed.
    Insufficient { available: i64 },
    /// The product is not cached.
    Missing,
}

/// Shared product cache. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct ProductCache {
    products: Arc<DashMap<i64, Product>>,
}

impl ProductCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known snapshot of a product.
    pub fn get(&self, id: i64) -> Option<Product> {
        self.products.get(&id).map(|entry| entry.value().clone())
    }

    /// Stores a snapshot, replacing whatever was there.
    pub fn set(&self, product: Product) {
        self.products.insert(product.id, product);
    }

    /// Stores a snapshot unless one is already cached, and returns the
    /// cached value either way.
    ///
    /// Used for read-through fills: a concurrent fill or decrement that got
    /// there first wins, so a stale store read can never restore stock that
    /// was already consumed.
    pub fn insert_if_absent(&self, product: Product) -> Product {
        self.products
            .entry(product.id)
            .or_insert(product)
            .value()
            .clone()
    }

    /// Drops a product, returning its last snapshot.
    pub fn remove(&self, id: i64) -> Option<Product> {
        self.products.remove(&id).map(|(_, product)| product)
    }

    /// Bulk-populates the cache.
    pub fn load(&self, products: impl IntoIterator<Item = Product>) -> usize {
        let mut count = 0;
        for product in products {
            self.set(product);
            count += 1;
        }
        count
    }

    /// Loads every product from `store`.
    ///
    /// A failure is logged and swallowed: the cache fills itself through
    /// read-through as products are requested.
    pub async fn warm(&self, store: &dyn ProductStore) -> usize {
        match store.list_products().await {
            Ok(products) => {
                let count = self.load(products);
                info!(count, "Product cache warmed");
                count
            }
            Err(e) => {
                error!(error = %e, "Failed to warm product cache, continuing with read-through");
                0
            }
        }
    }

    /// Atomically checks that `qty` units are on hand and takes them.
    pub fn try_consume(&self, id: i64, qty: i64) -> Consume {
        match self.products.entry(id) {
            Entry::Occupied(mut entry) => {
                let product = entry.get_mut();
                if product.stock < qty {
                    return Consume::Insufficient {
                        available: product.stock,
                    };
                }
                product.stock -= qty;
                debug!(product_id = id, qty, remaining = product.stock, "Stock consumed");
                Consume::Consumed(product.clone())
            }
            Entry::Vacant(_) => Consume::Missing,
        }
    }

    /// Gives `qty` units back. Returns the new snapshot, or `None` when the
    /// product is not cached.
    pub fn restock(&self, id: i64, qty: i64) -> Option<Product> {
        self.products.get_mut(&id).map(|mut entry| {
            entry.stock += qty;
            debug!(product_id = id, qty, stock = entry.stock, "Stock returned");
            entry.clone()
        })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{product, FakeStore};

    #[test]
    fn test_set_and_get() {
        let cache = ProductCache::new();
        assert!(cache.get(1).is_none());

        cache.set(product(1, 1000, 5));
        assert_eq!(cache.get(1).unwrap().stock, 5);

        // last writer wins
        cache.set(product(1, 1200, 9));
        let cached = cache.get(1).unwrap();
        assert_eq!(cached.price_cents, 1200);
        assert_eq!(cached.stock, 9);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove() {
        let cache = ProductCache::new();
        cache.set(product(1, 1000, 5));

        assert_eq!(cache.remove(1).unwrap().stock, 5);
        assert!(cache.get(1).is_none());
        assert!(cache.remove(1).is_none());
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let cache = ProductCache::new();
        cache.set(product(1, 1000, 2));

        let kept = cache.insert_if_absent(product(1, 1000, 10));
        assert_eq!(kept.stock, 2);

        let fresh = cache.insert_if_absent(product(2, 500, 4));
        assert_eq!(fresh.stock, 4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_try_consume() {
        let cache = ProductCache::new();
        cache.set(product(1, 1000, 3));

        match cache.try_consume(1, 2) {
            Consume::Consumed(p) => assert_eq!(p.stock, 1),
            other => panic!("unexpected {other:?}"),
        }
        // decrement is visible immediately
        assert_eq!(cache.get(1).unwrap().stock, 1);

        assert_eq!(cache.try_consume(1, 2), Consume::Insufficient { available: 1 });
        assert_eq!(cache.get(1).unwrap().stock, 1);

        assert_eq!(cache.try_consume(99, 1), Consume::Missing);
    }

    #[test]
    fn test_restock() {
        let cache = ProductCache::new();
        cache.set(product(1, 1000, 0));

        assert_eq!(cache.restock(1, 4).unwrap().stock, 4);
        assert!(cache.restock(2, 1).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_single_unit() {
        let cache = ProductCache::new();
        cache.set(product(1, 1000, 1));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                matches!(cache.try_consume(1, 1), Consume::Consumed(_))
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(cache.get(1).unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_warm_loads_everything() {
        let store = FakeStore::new();
        store.add_product(product(1, 1000, 5));
        store.add_product(product(2, 2000, 5));

        let cache = ProductCache::new();
        assert_eq!(cache.warm(&store).await, 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_warm_failure_is_not_fatal() {
        let store = FakeStore::new();
        store.add_product(product(1, 1000, 5));
        store.fail_listing();

        let cache = ProductCache::new();
        assert_eq!(cache.warm(&store).await, 0);
        assert!(cache.is_empty());
    }
}
