//! # Engine Error Types
//!
//! What the engine reports to its caller (the HTTP layer or the CLI).
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      OrderError Categories                              │
//! │                                                                         │
//! │  CLIENT ERRORS (request is wrong)                                      │
//! │  ├── Validation     - malformed lines, ids, quantities                 │
//! │  ├── EmptyOrder     - no requested product could be fulfilled          │
//! │  └── NotFound       - order id / receipt code unknown                  │
//! │                                                                         │
//! │  SERVER ERRORS (store or runtime failed)                               │
//! │  ├── Store          - DbError from till-db                             │
//! │  ├── Timeout        - detail lookup passed its deadline                │
//! │  └── TaskFailed     - a fan-out task panicked or was dropped           │
//! │                                                                         │
//! │  STARTUP ERRORS                                                        │
//! │  └── Config         - till.toml or environment rejected                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A product that cannot be found while pricing is NOT an error: the line is
//! skipped and the order continues without it.

use std::time::Duration;

use thiserror::Error;
use till_core::ValidationError;
use till_db::DbError;

/// Errors returned by the pricing engine, aggregator and order service.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("None of the requested products could be fulfilled")]
    EmptyOrder,

    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrderError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        OrderError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Checks if the caller sent a bad request (as opposed to a server-side
    /// failure).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrderError::NotFound { .. } | OrderError::Validation(_) | OrderError::EmptyOrder
        )
    }
}

impl From<tokio::task::JoinError> for OrderError {
    fn from(err: tokio::task::JoinError) -> Self {
        OrderError::TaskFailed(err.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for OrderError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        OrderError::TaskFailed("result channel closed before a reply".to_string())
    }
}

impl From<std::io::Error> for OrderError {
    fn from(err: std::io::Error) -> Self {
        OrderError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for OrderError {
    fn from(err: toml::de::Error) -> Self {
        OrderError::Config(err.to_string())
    }
}

/// Result type for engine operations.
pub type OrderResult<T> = Result<T, OrderError>;
