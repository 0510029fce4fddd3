//! In-memory store fake with failure injection, shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use till_core::{
    Cashier, Discount, DiscountKind, NewOrder, Order, Payment, PaymentKind, Product, ResolvedLine,
};
use till_db::{DbError, DbResult};

use crate::store::{CashierStore, OrderStore, PaymentStore, ProductStore};

pub fn product(id: i64, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id,
        name: format!("Product {id}"),
        sku: format!("SKU-{id:04}"),
        image: String::new(),
        price_cents,
        stock,
        discount_id: None,
        category_id: None,
        discount: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn percent(id: i64, result: i64) -> Discount {
    Discount {
        id,
        kind: DiscountKind::Percent,
        qty: 1,
        result,
        expired_at: None,
    }
}

pub fn buy_n(id: i64, qty: i64, result: i64) -> Discount {
    Discount {
        id,
        kind: DiscountKind::BuyN,
        qty,
        result,
        expired_at: None,
    }
}

fn injected(what: &str) -> DbError {
    DbError::QueryFailed(format!("injected {what} failure"))
}

#[derive(Default)]
pub struct FakeStore {
    products: Mutex<BTreeMap<i64, Product>>,
    discounts: Mutex<BTreeMap<i64, Discount>>,
    orders: Mutex<BTreeMap<i64, Order>>,
    lines: Mutex<BTreeMap<i64, Vec<ResolvedLine>>>,
    receipt_paths: Mutex<BTreeMap<i64, String>>,
    downloaded: Mutex<BTreeSet<i64>>,
    cashiers: Mutex<BTreeMap<i64, Cashier>>,
    payments: Mutex<BTreeMap<i64, Payment>>,
    stock_writes: Mutex<Vec<(i64, i64)>>,
    product_reads: AtomicUsize,
    duplicate_receipts: AtomicUsize,
    line_delay: Mutex<Option<Duration>>,
    stock_write_delay: Mutex<Option<(i64, Duration)>>,
    fail_product_reads: AtomicBool,
    fail_listing: AtomicBool,
    fail_stock_writes: AtomicBool,
    fail_order_writes: AtomicBool,
    fail_line_reads: AtomicBool,
    fail_cashier_reads: AtomicBool,
    fail_payment_reads: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the product with its discount split out, the way the store
    /// keeps them in separate tables.
    pub fn add_product(&self, mut product: Product) {
        if let Some(discount) = product.discount.take() {
            product.discount_id = Some(discount.id);
            self.discounts.lock().unwrap().insert(discount.id, discount);
        }
        self.products.lock().unwrap().insert(product.id, product);
    }

    pub fn add_cashier(&self, id: i64, name: &str) {
        self.cashiers.lock().unwrap().insert(
            id,
            Cashier {
                id,
                name: name.to_string(),
            },
        );
    }

    pub fn add_payment(&self, id: i64, name: &str, kind: PaymentKind) {
        self.payments.lock().unwrap().insert(
            id,
            Payment {
                id,
                name: name.to_string(),
                kind: Some(kind),
                logo: String::new(),
            },
        );
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }

    pub fn lines(&self, order_id: i64) -> Vec<ResolvedLine> {
        self.lines
            .lock()
            .unwrap()
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_receipt_path(&self, order_id: i64, path: &str) {
        self.receipt_paths
            .lock()
            .unwrap()
            .insert(order_id, path.to_string());
    }

    pub fn stock_writes(&self) -> Vec<(i64, i64)> {
        self.stock_writes.lock().unwrap().clone()
    }

    pub fn stored_stock(&self, id: i64) -> Option<i64> {
        self.products.lock().unwrap().get(&id).map(|p| p.stock)
    }

    pub fn product_reads(&self) -> usize {
        self.product_reads.load(Ordering::SeqCst)
    }

    /// The next `n` order inserts fail as receipt code collisions.
    pub fn collide_receipts(&self, n: usize) {
        self.duplicate_receipts.store(n, Ordering::SeqCst);
    }

    pub fn delay_lines(&self, delay: Duration) {
        *self.line_delay.lock().unwrap() = Some(delay);
    }

    /// Stock writes of exactly `stock` stall for `delay` before applying.
    pub fn delay_stock_write(&self, stock: i64, delay: Duration) {
        *self.stock_write_delay.lock().unwrap() = Some((stock, delay));
    }

    pub fn fail_product_reads(&self) {
        self.fail_product_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn fail_stock_writes(&self) {
        self.fail_stock_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_order_writes(&self) {
        self.fail_order_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_line_reads(&self) {
        self.fail_line_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_cashier_reads(&self) {
        self.fail_cashier_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_payment_reads(&self) {
        self.fail_payment_reads.store(true, Ordering::SeqCst);
    }

    fn failing(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductStore for FakeStore {
    async fn get_product_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        if Self::failing(&self.fail_product_reads) {
            return Err(injected("product read"));
        }
        self.product_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }

    async fn get_products_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Product>> {
        if Self::failing(&self.fail_product_reads) {
            return Err(injected("product read"));
        }
        let products = self.products.lock().unwrap();
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn list_products(&self) -> DbResult<Vec<Product>> {
        if Self::failing(&self.fail_listing) {
            return Err(injected("product listing"));
        }
        Ok(self.products.lock().unwrap().values().cloned().collect())
    }

    async fn create_product(&self, product: &Product) -> DbResult<Product> {
        let mut products = self.products.lock().unwrap();
        let id = products.keys().next_back().copied().unwrap_or(0) + 1;
        let stored = Product {
            id,
            discount: None,
            ..product.clone()
        };
        products.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_product(&self, product: &Product) -> DbResult<()> {
        let mut products = self.products.lock().unwrap();
        let Some(stored) = products.get_mut(&product.id) else {
            return Err(DbError::not_found("Product", product.id));
        };
        *stored = Product {
            discount: None,
            ..product.clone()
        };
        Ok(())
    }

    async fn delete_product(&self, id: i64) -> DbResult<()> {
        match self.products.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(DbError::not_found("Product", id)),
        }
    }

    async fn update_product_stock(&self, id: i64, stock: i64) -> DbResult<()> {
        let delay = *self.stock_write_delay.lock().unwrap();
        if let Some((slow, delay)) = delay {
            if slow == stock {
                tokio::time::sleep(delay).await;
            }
        }
        if Self::failing(&self.fail_stock_writes) {
            return Err(injected("stock write"));
        }
        let mut products = self.products.lock().unwrap();
        let Some(product) = products.get_mut(&id) else {
            return Err(DbError::not_found("Product", id));
        };
        product.stock = stock;
        self.stock_writes.lock().unwrap().push((id, stock));
        Ok(())
    }

    async fn get_discount_by_id(&self, id: i64) -> DbResult<Option<Discount>> {
        Ok(self.discounts.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl OrderStore for FakeStore {
    async fn get_order_by_id(&self, id: i64) -> DbResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn get_order_by_receipt_code(&self, code: &str) -> DbResult<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.receipt_id == code)
            .cloned())
    }

    async fn get_ordered_lines_by_order_id(&self, order_id: i64) -> DbResult<Vec<ResolvedLine>> {
        let delay = *self.line_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if Self::failing(&self.fail_line_reads) {
            return Err(injected("line read"));
        }
        Ok(self.lines(order_id))
    }

    async fn create_order(&self, order: &NewOrder) -> DbResult<Order> {
        if Self::failing(&self.fail_order_writes) {
            return Err(injected("order write"));
        }
        let collide = self
            .duplicate_receipts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collide {
            return Err(DbError::duplicate("receipt_id", &order.receipt_id));
        }

        let mut orders = self.orders.lock().unwrap();
        let id = orders.keys().next_back().copied().unwrap_or(0) + 1;
        let stored = order.clone().into_order(id);
        orders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn create_ordered_lines(&self, order_id: i64, lines: &[ResolvedLine]) -> DbResult<()> {
        let stored = lines
            .iter()
            .cloned()
            .map(|mut line| {
                line.remaining_stock = None;
                line
            })
            .collect();
        self.lines.lock().unwrap().insert(order_id, stored);
        Ok(())
    }

    async fn list_orders(&self, limit: i64, skip: i64) -> DbResult<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .rev()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_receipt_downloaded(&self, order_id: i64) -> DbResult<Option<String>> {
        if !self.orders.lock().unwrap().contains_key(&order_id) {
            return Ok(None);
        }
        self.downloaded.lock().unwrap().insert(order_id);
        let path = self.receipt_paths.lock().unwrap().get(&order_id).cloned();
        Ok(Some(path.unwrap_or_default()))
    }

    async fn receipt_download_status(&self, order_id: i64) -> DbResult<Option<bool>> {
        if !self.orders.lock().unwrap().contains_key(&order_id) {
            return Ok(None);
        }
        Ok(Some(self.downloaded.lock().unwrap().contains(&order_id)))
    }
}

#[async_trait]
impl CashierStore for FakeStore {
    async fn get_cashier_by_id(&self, id: i64) -> DbResult<Option<Cashier>> {
        if Self::failing(&self.fail_cashier_reads) {
            return Err(injected("cashier read"));
        }
        Ok(self.cashiers.lock().unwrap().get(&id).cloned())
    }

    async fn list_cashiers(&self) -> DbResult<Vec<Cashier>> {
        if Self::failing(&self.fail_cashier_reads) {
            return Err(injected("cashier read"));
        }
        Ok(self.cashiers.lock().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl PaymentStore for FakeStore {
    async fn get_payment_by_id(&self, id: i64) -> DbResult<Option<Payment>> {
        if Self::failing(&self.fail_payment_reads) {
            return Err(injected("payment read"));
        }
        Ok(self.payments.lock().unwrap().get(&id).cloned())
    }

    async fn list_payments(&self) -> DbResult<Vec<Payment>> {
        if Self::failing(&self.fail_payment_reads) {
            return Err(injected("payment read"));
        }
        Ok(self.payments.lock().unwrap().values().cloned().collect())
    }
}
