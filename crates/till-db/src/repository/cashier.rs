//! # Cashier Repository

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::Cashier;

#[derive(Debug, FromRow)]
struct CashierRow {
    id: i64,
    name: String,
}

impl From<CashierRow> for Cashier {
    fn from(row: CashierRow) -> Self {
        Cashier {
            id: row.id,
            name: row.name,
        }
    }
}

/// Repository for cashiers.
#[derive(Debug, Clone)]
pub struct CashierRepository {
    pool: SqlitePool,
}

impl CashierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashierRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Cashier>> {
        debug!(cashier_id = id, "Fetching cashier");

        let row: Option<CashierRow> = sqlx::query_as("SELECT id, name FROM cashiers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Cashier::from))
    }

    /// Lists every cashier, ordered by id.
    pub async fn list(&self) -> DbResult<Vec<Cashier>> {
        let rows: Vec<CashierRow> = sqlx::query_as("SELECT id, name FROM cashiers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Cashier::from).collect())
    }

    pub async fn insert(&self, name: &str) -> DbResult<Cashier> {
        debug!(name = %name, "Inserting cashier");

        let result = sqlx::query("INSERT INTO cashiers (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(Cashier {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }
}
