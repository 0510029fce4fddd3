//! # Category Repository
//!
//! Categories only group products; pricing never reads them.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::Category;

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
}

/// Repository for product categories.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    pub async fn insert(&self, name: &str) -> DbResult<Category> {
        debug!(name = %name, "Inserting category");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO categories (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
        )
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Category {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }
}
