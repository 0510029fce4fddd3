//! # Discount Repository
//!
//! Discount rules are written once and attached to products by id.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::Discount;

#[derive(Debug, FromRow)]
struct DiscountRow {
    id: i64,
    qty: i64,
    #[sqlx(rename = "type")]
    kind: String,
    result: i64,
    expired_at: Option<DateTime<Utc>>,
}

impl TryFrom<DiscountRow> for Discount {
    type Error = DbError;

    fn try_from(row: DiscountRow) -> DbResult<Self> {
        Ok(Discount {
            id: row.id,
            kind: row.kind.parse().map_err(|e| DbError::corrupt("Discount", e))?,
            qty: row.qty,
            result: row.result,
            expired_at: row.expired_at,
        })
    }
}

/// Repository for discount rules.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Gets a discount by its ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Discount>> {
        debug!(discount_id = id, "Fetching discount");

        let row: Option<DiscountRow> =
            sqlx::query_as("SELECT id, qty, type, result, expired_at FROM discounts WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Discount::try_from).transpose()
    }

    /// Inserts a discount rule. `discount.id` is ignored.
    pub async fn insert(&self, discount: &Discount) -> DbResult<Discount> {
        debug!(kind = %discount.kind, "Inserting discount");

        let result = sqlx::query(
            r#"
            INSERT INTO discounts (qty, type, result, expired_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(discount.qty)
        .bind(discount.kind.as_str())
        .bind(discount.result)
        .bind(discount.expired_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(Discount {
            id: result.last_insert_rowid(),
            ..discount.clone()
        })
    }
}
