//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Lookups by id, by a set of ids, and full listing (cache warm-up)
//! - CRUD operations
//! - Stock writes coming from the engine's flusher
//!
//! ## Discount Join
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every read LEFT JOINs discounts so a product comes back with its      │
//! │  rule already resolved:                                                │
//! │                                                                         │
//! │  products p                         discounts d                        │
//! │  ┌────┬──────────┬─────────────┐    ┌────┬─────────┬─────┬────────┐   │
//! │  │ id │ name     │ discount_id │───►│ id │ type    │ qty │ result │   │
//! │  │ 1  │ Kopi     │ 3           │    │ 3  │ BUY_N   │ 3   │ 500    │   │
//! │  │ 2  │ Teh      │ NULL        │    └────┴─────────┴─────┴────────┘   │
//! │  └────┴──────────┴─────────────┘                                       │
//! │                                                                         │
//! │  Product { id: 1, discount: Some(BUY_N 3 × 500) }                      │
//! │  Product { id: 2, discount: None }                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{Discount, Product};

const PRODUCT_COLUMNS: &str = r#"
    p.id, p.name, p.sku, p.image, p.price_cents, p.stock,
    p.discount_id, p.category_id, p.created_at, p.updated_at,
    d.qty AS d_qty, d.type AS d_type, d.result AS d_result, d.expired_at AS d_expired_at
"#;

/// Raw product row with its joined discount columns.
#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    sku: String,
    image: String,
    price_cents: i64,
    stock: i64,
    discount_id: Option<i64>,
    category_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    d_qty: Option<i64>,
    d_type: Option<String>,
    d_result: Option<i64>,
    d_expired_at: Option<DateTime<Utc>>,
}

impl ProductRow {
    fn into_product(self) -> DbResult<Product> {
        let discount = match (self.discount_id, self.d_type) {
            (Some(id), Some(kind)) => Some(Discount {
                id,
                kind: kind.parse().map_err(|e| DbError::corrupt("Discount", e))?,
                qty: self.d_qty.unwrap_or_default(),
                result: self.d_result.unwrap_or_default(),
                expired_at: self.d_expired_at,
            }),
            _ => None,
        };

        Ok(Product {
            id: self.id,
            name: self.name,
            sku: self.sku,
            image: self.image,
            price_cents: self.price_cents,
            stock: self.stock,
            discount_id: self.discount_id,
            category_id: self.category_id,
            discount,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.get_by_id(7).await?;
/// repo.update_stock(7, 12).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found, discount resolved
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        debug!(product_id = id, "Fetching product");

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             LEFT JOIN discounts d ON d.id = p.discount_id \
             WHERE p.id = ?1"
        );

        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProductRow::into_product).transpose()
    }

    /// Gets every product whose id is in `ids`. Unknown ids are skipped.
    pub async fn get_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Fetching products by id");

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             LEFT JOIN discounts d ON d.id = p.discount_id \
             WHERE p.id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY p.id");

        let rows: Vec<ProductRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Lists every product. Used to warm the engine's cache at startup.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             LEFT JOIN discounts d ON d.id = p.discount_id \
             ORDER BY p.id"
        );

        let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        debug!(count = rows.len(), "Listed products");
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Inserts a new product.
    ///
    /// `product.id` is ignored; the stored row's id is returned in the
    /// result.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                name, sku, image, price_cents, stock,
                discount_id, category_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.image)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.discount_id)
        .bind(product.category_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(Product {
            id: result.last_insert_rowid(),
            ..product.clone()
        })
    }

    /// Updates an existing product.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(product_id = product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                sku = ?3,
                image = ?4,
                price_cents = ?5,
                stock = ?6,
                discount_id = ?7,
                category_id = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.image)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.discount_id)
        .bind(product.category_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.id));
        }

        Ok(())
    }

    /// Sets a product's stock level.
    ///
    /// ## Absolute, Not Delta
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  The engine's cache is the authority for live stock. Each write     │
    /// │  carries the level cached at the moment of the write:               │
    /// │                                                                     │
    /// │     UPDATE products SET stock = 7 WHERE id = ?                      │
    /// │                                                                     │
    /// │  The engine never has two writes for one product in flight, so      │
    /// │  the last write to land is the latest cached level.                 │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    pub async fn update_stock(&self, id: i64, stock: i64) -> DbResult<()> {
        debug!(product_id = id, stock, "Updating stock");

        let result = sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deletes a product.
    ///
    /// Fails with a foreign key violation while order history still
    /// references it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(product_id = id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{sample_product, test_db};
    use till_core::{Discount, DiscountKind};

    #[tokio::test]
    async fn test_insert_and_get_product() {
        let db = test_db().await;

        let stored = db.products().insert(&sample_product("Kopi Susu", 1800, 5)).await.unwrap();
        assert!(stored.id > 0);

        let found = db.products().get_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Kopi Susu");
        assert_eq!(found.stock, 5);
        assert!(found.discount.is_none());

        assert!(db.products().get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_product_carries_joined_discount() {
        let db = test_db().await;

        let discount = db
            .discounts()
            .insert(&Discount {
                id: 0,
                kind: DiscountKind::BuyN,
                qty: 3,
                result: 500,
                expired_at: None,
            })
            .await
            .unwrap();

        let mut product = sample_product("Roti Bakar", 1000, 10);
        product.discount_id = Some(discount.id);
        let stored = db.products().insert(&product).await.unwrap();

        let found = db.products().get_by_id(stored.id).await.unwrap().unwrap();
        let joined = found.discount.unwrap();
        assert_eq!(joined.kind, DiscountKind::BuyN);
        assert_eq!(joined.qty, 3);
        assert_eq!(joined.result, 500);
    }

    #[tokio::test]
    async fn test_get_by_ids_skips_unknown() {
        let db = test_db().await;
        let a = db.products().insert(&sample_product("A", 100, 1)).await.unwrap();
        let b = db.products().insert(&sample_product("B", 200, 2)).await.unwrap();

        let found = db.products().get_by_ids(&[b.id, 404, a.id]).await.unwrap();
        let ids: Vec<i64> = found.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        assert!(db.products().get_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_stock() {
        let db = test_db().await;
        let stored = db.products().insert(&sample_product("Teh", 500, 10)).await.unwrap();

        db.products().update_stock(stored.id, 7).await.unwrap();
        let found = db.products().get_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(found.stock, 7);

        let err = db.products().update_stock(404, 1).await.unwrap_err();
        assert!(matches!(err, crate::DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = test_db().await;
        let mut stored = db.products().insert(&sample_product("Es Jeruk", 700, 3)).await.unwrap();

        stored.price_cents = 900;
        db.products().update(&stored).await.unwrap();
        let found = db.products().get_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(found.price_cents, 900);

        db.products().delete(stored.id).await.unwrap();
        assert!(db.products().get_by_id(stored.id).await.unwrap().is_none());
        assert_eq!(db.products().count().await.unwrap(), 0);
    }
}
