//! # Payment Repository
//!
//! Payment methods a customer can settle an order with (cash, e-wallet,
//! card terminal).

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{Payment, PaymentKind};

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: i64,
    name: String,
    #[sqlx(rename = "type")]
    kind: String,
    logo: String,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> DbResult<Self> {
        Ok(Payment {
            id: row.id,
            name: row.name,
            kind: Some(row.kind.parse().map_err(|e| DbError::corrupt("Payment", e))?),
            logo: row.logo,
        })
    }
}

/// Repository for payment methods.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Payment>> {
        debug!(payment_id = id, "Fetching payment");

        let row: Option<PaymentRow> =
            sqlx::query_as("SELECT id, name, type, logo FROM payments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Payment::try_from).transpose()
    }

    /// Lists every payment method, ordered by id.
    pub async fn list(&self) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> =
            sqlx::query_as("SELECT id, name, type, logo FROM payments ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    pub async fn insert(&self, name: &str, kind: PaymentKind, logo: &str) -> DbResult<Payment> {
        debug!(name = %name, kind = kind.as_str(), "Inserting payment");

        let result = sqlx::query(
            "INSERT INTO payments (name, type, logo, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(name)
        .bind(kind.as_str())
        .bind(logo)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(Payment {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            kind: Some(kind),
            logo: logo.to_string(),
        })
    }
}
