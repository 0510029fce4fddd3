//! # Order Aggregator
//!
//! Assembles the composite order view (header, cashier, payment and line
//! items) from independent store lookups run concurrently.
//!
//! ## Fan-Out
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BY ID                                                                  │
//! │                                                                         │
//! │   spawn ──► header ──► try_join!(cashier, payment) ──► oneshot ──┐     │
//! │   spawn ──► lines ───────────────────────────────────► oneshot ──┤     │
//! │                                                                  ▼     │
//! │                                         header missing? ─► NotFound    │
//! │                                         either failed?  ─► error       │
//! │                                                                         │
//! │  BY RECEIPT CODE                                                        │
//! │                                                                         │
//! │   header(code) ──► order id ──► try_join!(cashier, payment, lines)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A missing cashier or payment (no reference on the order, or a reference
//! to a row that no longer exists) yields the empty default record.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use till_core::{Cashier, Order, OrderDetail, OrderSummary, Payment};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{OrderError, OrderResult};
use crate::store::{CashierStore, OrderStore, PaymentStore};

// =============================================================================
// Lookup Key
// =============================================================================

/// How an order is identified by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    Id(i64),
    ReceiptCode(String),
}

impl fmt::Display for OrderLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderLookup::Id(id) => write!(f, "{}", id),
            OrderLookup::ReceiptCode(code) => write!(f, "{}", code),
        }
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Builds [`OrderDetail`] and [`OrderSummary`] views. Clones share the same
/// stores.
#[derive(Clone)]
pub struct OrderAggregator {
    orders: Arc<dyn OrderStore>,
    cashiers: Arc<dyn CashierStore>,
    payments: Arc<dyn PaymentStore>,
}

impl fmt::Debug for OrderAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderAggregator").finish_non_exhaustive()
    }
}

impl OrderAggregator {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        cashiers: Arc<dyn CashierStore>,
        payments: Arc<dyn PaymentStore>,
    ) -> Self {
        OrderAggregator {
            orders,
            cashiers,
            payments,
        }
    }

    /// Fetches one order with everything a receipt needs.
    ///
    /// With `deadline` set, the whole lookup is bounded and fails with
    /// [`OrderError::Timeout`] when it runs over. Tasks already spawned are
    /// left to finish on their own.
    pub async fn get_order_detail(
        &self,
        lookup: OrderLookup,
        deadline: Option<Duration>,
    ) -> OrderResult<OrderDetail> {
        let fetch = async {
            match &lookup {
                OrderLookup::Id(id) => self.detail_by_id(*id).await,
                OrderLookup::ReceiptCode(code) => self.detail_by_receipt(code).await,
            }
        };

        match deadline {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| OrderError::Timeout(limit))?,
            None => fetch.await,
        }
    }

    /// Looks up the cashier and payment referenced by `order`.
    pub async fn enrich(&self, order: &Order) -> OrderResult<(Cashier, Payment)> {
        enrich_order(
            self.cashiers.as_ref(),
            self.payments.as_ref(),
            order,
        )
        .await
    }

    /// Page of orders, newest first, each with its cashier and payment.
    ///
    /// Cashiers and payments are small reference tables, so both are read
    /// whole alongside the page and joined in memory.
    pub async fn list_orders(&self, limit: i64, skip: i64) -> OrderResult<Vec<OrderSummary>> {
        let (orders, cashiers, payments) = tokio::try_join!(
            async { self.orders.list_orders(limit, skip).await.map_err(OrderError::from) },
            async { self.cashiers.list_cashiers().await.map_err(OrderError::from) },
            async { self.payments.list_payments().await.map_err(OrderError::from) },
        )?;

        let cashiers: HashMap<i64, Cashier> = cashiers.into_iter().map(|c| (c.id, c)).collect();
        let payments: HashMap<i64, Payment> = payments.into_iter().map(|p| (p.id, p)).collect();

        let summaries = orders
            .into_iter()
            .map(|order| {
                let cashier = order
                    .cashier_id
                    .and_then(|id| cashiers.get(&id).cloned())
                    .unwrap_or_default();
                let payment = payments.get(&order.payment_id).cloned().unwrap_or_default();
                OrderSummary {
                    order,
                    cashier,
                    payment,
                }
            })
            .collect::<Vec<_>>();

        debug!(count = summaries.len(), limit, skip, "Order page assembled");
        Ok(summaries)
    }

    async fn detail_by_id(&self, id: i64) -> OrderResult<OrderDetail> {
        let header_rx = {
            let orders = Arc::clone(&self.orders);
            let cashiers = Arc::clone(&self.cashiers);
            let payments = Arc::clone(&self.payments);
            spawn_reply(async move {
                let Some(order) = orders.get_order_by_id(id).await? else {
                    return Ok(None);
                };
                let (cashier, payment) =
                    enrich_order(cashiers.as_ref(), payments.as_ref(), &order).await?;
                Ok(Some((order, cashier, payment)))
            })
        };

        let lines_rx = {
            let orders = Arc::clone(&self.orders);
            spawn_reply(async move {
                orders
                    .get_ordered_lines_by_order_id(id)
                    .await
                    .map_err(OrderError::from)
            })
        };

        let (header, lines) = tokio::join!(header_rx, lines_rx);

        // the header decides NotFound, whatever the lines branch reported
        let Some((order, cashier, payment)) = header?? else {
            return Err(OrderError::not_found("Order", id));
        };
        let products = lines??;

        debug!(order_id = id, lines = products.len(), "Order detail assembled");
        Ok(OrderDetail {
            order,
            cashier,
            payment,
            products,
        })
    }

    async fn detail_by_receipt(&self, code: &str) -> OrderResult<OrderDetail> {
        let Some(order) = self.orders.get_order_by_receipt_code(code).await? else {
            return Err(OrderError::not_found("Order", code));
        };

        let (cashier, payment, products) = tokio::try_join!(
            cashier_for(self.cashiers.as_ref(), order.cashier_id),
            payment_for(self.payments.as_ref(), order.payment_id),
            async {
                self.orders
                    .get_ordered_lines_by_order_id(order.id)
                    .await
                    .map_err(OrderError::from)
            },
        )?;

        debug!(order_id = order.id, receipt = code, lines = products.len(), "Order detail assembled");
        Ok(OrderDetail {
            order,
            cashier,
            payment,
            products,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Runs `fut` on its own task and hands back the receiver for its result.
fn spawn_reply<T, F>(fut: F) -> oneshot::Receiver<OrderResult<T>>
where
    T: Send + 'static,
    F: Future<Output = OrderResult<T>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        // receiver gone means the caller timed out
        let _ = tx.send(fut.await);
    });
    rx
}

async fn enrich_order(
    cashiers: &dyn CashierStore,
    payments: &dyn PaymentStore,
    order: &Order,
) -> OrderResult<(Cashier, Payment)> {
    tokio::try_join!(
        cashier_for(cashiers, order.cashier_id),
        payment_for(payments, order.payment_id),
    )
}

async fn cashier_for(store: &dyn CashierStore, id: Option<i64>) -> OrderResult<Cashier> {
    match id {
        Some(id) => Ok(store.get_cashier_by_id(id).await?.unwrap_or_default()),
        None => Ok(Cashier::default()),
    }
}

async fn payment_for(store: &dyn PaymentStore, id: i64) -> OrderResult<Payment> {
    Ok(store.get_payment_by_id(id).await?.unwrap_or_default())
}
