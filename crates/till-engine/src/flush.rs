//! # Stock Flusher
//!
//! Carries stock levels from the product cache to the store.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Flush Mode Comparison                             │
//! │                                                                         │
//! │  BACKGROUND (Default)               │  SYNCHRONOUS                      │
//! │  ─────────────────────              │  ────────────                     │
//! │  • persist() queues and returns     │  • persist() awaits the write     │
//! │  • one worker writes in FIFO order  │  • one write per product at once  │
//! │  • failure is logged, never raised  │  • failure reaches the caller     │
//! │  • crash before the write loses it  │  • engine gives the stock back    │
//! │                                                                         │
//! │  pricing ──► cache.try_consume ──► persist(product_id)                 │
//! │                                        │                                │
//! │                           ┌────────────┴─────────────┐                  │
//! │                           ▼ BACKGROUND               ▼ SYNCHRONOUS      │
//! │                  ┌─────────────────┐        ┌─────────────────┐        │
//! │                  │ mpsc (unbounded)│        │ product lock    │        │
//! │                  │   └─► worker    │        │  └─► write      │        │
//! │                  └─────────────────┘        └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes are absolute, so the level written is read from the cache at the
//! moment of the write rather than captured when the stock was taken. Every
//! cache change is followed by a persist, which makes the last write for a
//! product carry its latest level whichever order concurrent writes finish
//! in.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use till_db::DbResult;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::cache::ProductCache;
use crate::error::OrderError;
use crate::store::ProductStore;

// =============================================================================
// Flush Mode
// =============================================================================

/// How stock levels reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Queue the write and return immediately.
    #[default]
    Background,

    /// Await the write before the order continues.
    Synchronous,
}

impl fmt::Display for FlushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushMode::Background => write!(f, "background"),
            FlushMode::Synchronous => write!(f, "synchronous"),
        }
    }
}

impl FromStr for FlushMode {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "background" | "async" => Ok(FlushMode::Background),
            "synchronous" | "sync" => Ok(FlushMode::Synchronous),
            other => Err(OrderError::Config(format!(
                "Unknown flush mode: '{}'. Valid options: background, synchronous",
                other
            ))),
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug)]
enum FlushCommand {
    /// Write one product's current stock level.
    Write { product_id: i64 },
    /// Acknowledge once everything queued before it has been attempted.
    Drain(oneshot::Sender<()>),
    /// Stop the worker after the queue ahead of it.
    Shutdown,
}

// =============================================================================
// Stock Flusher
// =============================================================================

/// Handle to the stock persistence policy. Clones share the same worker.
#[derive(Clone)]
pub struct StockFlusher {
    mode: FlushMode,
    cache: ProductCache,
    store: Arc<dyn ProductStore>,
    cmd_tx: Option<mpsc::UnboundedSender<FlushCommand>>,
    /// Synchronous mode only: serializes writes per product.
    write_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl fmt::Debug for StockFlusher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StockFlusher")
            .field("mode", &self.mode)
            .field("worker", &self.cmd_tx.is_some())
            .finish_non_exhaustive()
    }
}

impl StockFlusher {
    /// Creates the flusher for `cache`; in background mode this spawns the
    /// worker, so it must be called inside a tokio runtime.
    pub fn start(mode: FlushMode, cache: ProductCache, store: Arc<dyn ProductStore>) -> Self {
        let cmd_tx = match mode {
            FlushMode::Background => {
                let (tx, rx) = mpsc::unbounded_channel();
                let worker_cache = cache.clone();
                let worker_store = Arc::clone(&store);
                tokio::spawn(async move {
                    run(worker_cache, worker_store, rx).await;
                });
                Some(tx)
            }
            FlushMode::Synchronous => None,
        };

        info!(mode = %mode, "Stock flusher started");
        StockFlusher {
            mode,
            cache,
            store,
            cmd_tx,
            write_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn mode(&self) -> FlushMode {
        self.mode
    }

    /// The cache whose stock levels this flusher writes.
    pub fn cache(&self) -> &ProductCache {
        &self.cache
    }

    /// Brings the stored stock of `product_id` up to its cached level.
    ///
    /// Call after every cache change to the product's stock. Only
    /// synchronous mode can return an error.
    pub async fn persist(&self, product_id: i64) -> DbResult<()> {
        match &self.cmd_tx {
            Some(tx) => {
                if tx.send(FlushCommand::Write { product_id }).is_err() {
                    warn!(product_id, "Stock flusher stopped, write dropped");
                }
                Ok(())
            }
            None => {
                let lock = self
                    .write_locks
                    .entry(product_id)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone();
                let _guard = lock.lock().await;

                // read under the lock: a write that queued behind this one
                // sees at least this level
                match self.cache.get(product_id) {
                    Some(product) => {
                        self.store
                            .update_product_stock(product_id, product.stock)
                            .await
                    }
                    None => {
                        warn!(product_id, "Product not cached, nothing to write");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Waits until every write queued so far has been attempted.
    pub async fn drain(&self) {
        if let Some(tx) = &self.cmd_tx {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(FlushCommand::Drain(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }

    /// Stops the worker once the writes already queued are done.
    pub async fn shutdown(&self) {
        self.drain().await;
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(FlushCommand::Shutdown);
        }
    }
}

/// Worker loop: applies writes one at a time, in arrival order.
async fn run(
    cache: ProductCache,
    store: Arc<dyn ProductStore>,
    mut cmd_rx: mpsc::UnboundedReceiver<FlushCommand>,
) {
    debug!("Stock flush worker running");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            FlushCommand::Write { product_id } => {
                let Some(product) = cache.get(product_id) else {
                    warn!(product_id, "Product not cached, nothing to write");
                    continue;
                };
                if let Err(e) = store.update_product_stock(product_id, product.stock).await {
                    warn!(product_id, stock = product.stock, error = %e, "Background stock write failed");
                }
            }
            FlushCommand::Drain(ack) => {
                let _ = ack.send(());
            }
            FlushCommand::Shutdown => break,
        }
    }

    info!("Stock flush worker stopped");
}
