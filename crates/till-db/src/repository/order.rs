//! # Order Repository
//!
//! Order headers and their ordered-product lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Order Lifecycle                                      │
//! │                                                                         │
//! │  1. place(order, lines)                                                │
//! │     └── BEGIN                                                          │
//! │         ├── INSERT INTO orders          (receipt_id UNIQUE)            │
//! │         ├── INSERT INTO ordered_products × N                           │
//! │         └── COMMIT                       (or nothing is stored)        │
//! │                                                                         │
//! │  2. get_by_id / get_by_receipt_code                                    │
//! │     └── header only                                                    │
//! │                                                                         │
//! │  3. get_lines(order_id)                                                │
//! │     └── line snapshots, discount re-joined by id                       │
//! │                                                                         │
//! │  4. mark_receipt_downloaded / receipt_download_status                  │
//! │     └── is_downloaded flag, receipt_file_path                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use till_core::{Discount, Money, NewOrder, Order, ResolvedLine};

const ORDER_COLUMNS: &str = "id, payment_id, cashier_id, total_paid, total_price, \
                             total_return, receipt_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    payment_id: i64,
    cashier_id: Option<i64>,
    total_paid: i64,
    total_price: i64,
    total_return: i64,
    receipt_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            payment_id: row.payment_id,
            cashier_id: row.cashier_id,
            total_paid: Money::from_cents(row.total_paid),
            total_price: Money::from_cents(row.total_price),
            total_return: Money::from_cents(row.total_return),
            receipt_id: row.receipt_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    product_id: i64,
    qty: i64,
    name_product: String,
    sku_product: String,
    price_product: i64,
    total_normal_price: i64,
    total_final_price: i64,
    discount_id: Option<i64>,
    d_qty: Option<i64>,
    d_type: Option<String>,
    d_result: Option<i64>,
    d_expired_at: Option<DateTime<Utc>>,
}

impl LineRow {
    fn into_line(self) -> DbResult<ResolvedLine> {
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

        Ok(ResolvedLine {
            product_id: self.product_id,
            name: self.name_product,
            sku: self.sku_product,
            unit_price: Money::from_cents(self.price_product),
            discount,
            qty: self.qty,
            total_normal_price: Money::from_cents(self.total_normal_price),
            total_final_price: Money::from_cents(self.total_final_price),
            remaining_stock: None,
        })
    }
}

/// Repository for orders and ordered lines.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order header by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Order>> {
        debug!(order_id = id, "Fetching order");

        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    /// Gets an order header by its receipt code.
    pub async fn get_by_receipt_code(&self, receipt_id: &str) -> DbResult<Option<Order>> {
        debug!(receipt_id = %receipt_id, "Fetching order by receipt code");

        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE receipt_id = ?1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(receipt_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    /// Gets the line items of an order, in the order they were written.
    ///
    /// An unknown order id yields an empty list.
    pub async fn get_lines(&self, order_id: i64) -> DbResult<Vec<ResolvedLine>> {
        let rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT
                op.product_id, op.qty, op.name_product, op.sku_product,
                op.price_product, op.total_normal_price, op.total_final_price,
                op.discount_id,
                d.qty AS d_qty, d.type AS d_type, d.result AS d_result,
                d.expired_at AS d_expired_at
            FROM ordered_products op
            LEFT JOIN discounts d ON d.id = op.discount_id
            WHERE op.order_id = ?1
            ORDER BY op.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(order_id, count = rows.len(), "Fetched order lines");
        rows.into_iter().map(LineRow::into_line).collect()
    }

    /// Inserts an order header on its own.
    pub async fn insert(&self, order: &NewOrder) -> DbResult<Order> {
        let mut conn = self.pool.acquire().await?;
        insert_order(&mut *conn, order).await
    }

    /// Inserts line items for an existing order.
    pub async fn insert_lines(&self, order_id: i64, lines: &[ResolvedLine]) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_lines(&mut *conn, order_id, lines).await
    }

    /// Stores an order header and its lines in one transaction.
    ///
    /// Either both are stored or neither is. A receipt code collision comes
    /// back as `DbError::UniqueViolation`.
    pub async fn place(&self, order: &NewOrder, lines: &[ResolvedLine]) -> DbResult<Order> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let stored = insert_order(&mut *tx, order).await?;
        insert_lines(&mut *tx, stored.id, lines).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id = stored.id,
            receipt_id = %stored.receipt_id,
            lines = lines.len(),
            total_price = stored.total_price.cents(),
            "Order stored"
        );
        Ok(stored)
    }

    /// Lists order headers, newest first.
    pub async fn list(&self, limit: i64, skip: i64) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY id DESC LIMIT ?1 OFFSET ?2"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Flags the receipt as downloaded and returns its file path, or `None`
    /// when the order does not exist. Repeat calls are harmless.
    pub async fn mark_receipt_downloaded(&self, id: i64) -> DbResult<Option<String>> {
        let path: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE orders SET is_downloaded = 1, updated_at = ?2
            WHERE id = ?1
            RETURNING receipt_file_path
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if path.is_some() {
            debug!(order_id = id, "Receipt marked downloaded");
        }
        Ok(path)
    }

    pub async fn receipt_download_status(&self, id: i64) -> DbResult<Option<bool>> {
        let flag: Option<i64> = sqlx::query_scalar("SELECT is_downloaded FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(flag.map(|f| f != 0))
    }

    /// Counts stored orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-level helpers (shared by pool and transaction paths)
// =============================================================================

async fn insert_order(conn: &mut SqliteConnection, order: &NewOrder) -> DbResult<Order> {
    debug!(receipt_id = %order.receipt_id, "Inserting order");

    let result = sqlx::query(
        r#"
        INSERT INTO orders (
            payment_id, cashier_id, total_paid, total_price, total_return,
            receipt_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        "#,
    )
    .bind(order.payment_id)
    .bind(order.cashier_id)
    .bind(order.total_paid.cents())
    .bind(order.total_price.cents())
    .bind(order.total_return.cents())
    .bind(&order.receipt_id)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &order.receipt_id),
        other => other,
    })?;

    Ok(order.clone().into_order(result.last_insert_rowid()))
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    order_id: i64,
    lines: &[ResolvedLine],
) -> DbResult<()> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO ordered_products (
                order_id, product_id, qty, name_product, sku_product,
                price_product, total_normal_price, total_final_price, discount_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.qty)
        .bind(&line.name)
        .bind(&line.sku)
        .bind(line.unit_price.cents())
        .bind(line.total_normal_price.cents())
        .bind(line.total_final_price.cents())
        .bind(line.discount_id())
        .execute(&mut *conn)
        .await?;
    }

    debug!(order_id, count = lines.len(), "Inserted order lines");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::{sample_product, test_db};
    use crate::DbError;
    use chrono::Utc;
    use till_core::{Money, NewOrder, PaymentKind, ResolvedLine};

    fn line_for(product_id: i64, qty: i64, unit: i64) -> ResolvedLine {
        ResolvedLine {
            product_id,
            name: "Kopi".to_string(),
            sku: "KOPI-1".to_string(),
            unit_price: Money::from_cents(unit),
            discount: None,
            qty,
            total_normal_price: Money::from_cents(unit * qty),
            total_final_price: Money::from_cents(unit * qty),
            remaining_stock: Some(3),
        }
    }

    async fn seeded() -> (crate::Database, i64, i64) {
        let db = test_db().await;
        let payment = db
            .payments()
            .insert("Tunai", PaymentKind::Cash, "")
            .await
            .unwrap();
        let product = db.products().insert(&sample_product("Kopi", 1000, 10)).await.unwrap();
        (db, payment.id, product.id)
    }

    fn new_order(payment_id: i64, receipt: &str, price: i64) -> NewOrder {
        NewOrder::new(
            payment_id,
            None,
            Money::from_cents(5000),
            Money::from_cents(price),
            receipt.to_string(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_place_and_read_back() {
        let (db, payment_id, product_id) = seeded().await;

        let order = db
            .orders()
            .place(&new_order(payment_id, "S482Q", 2000), &[line_for(product_id, 2, 1000)])
            .await
            .unwrap();
        assert!(order.id > 0);
        assert_eq!(order.total_return.cents(), 3000);

        let header = db.orders().get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(header.receipt_id, "S482Q");

        let by_code = db.orders().get_by_receipt_code("S482Q").await.unwrap().unwrap();
        assert_eq!(by_code.id, order.id);

        let lines = db.orders().get_lines(order.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].qty, 2);
        assert_eq!(lines[0].total_final_price.cents(), 2000);
        assert_eq!(lines[0].remaining_stock, None);
    }

    #[tokio::test]
    async fn test_missing_order_lookups() {
        let db = test_db().await;
        assert!(db.orders().get_by_id(404).await.unwrap().is_none());
        assert!(db.orders().get_by_receipt_code("S001a").await.unwrap().is_none());
        assert!(db.orders().get_lines(404).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_receipt_code_rejected() {
        let (db, payment_id, product_id) = seeded().await;
        let lines = [line_for(product_id, 1, 1000)];

        db.orders()
            .place(&new_order(payment_id, "S100a", 1000), &lines)
            .await
            .unwrap();
        let err = db
            .orders()
            .place(&new_order(payment_id, "S100a", 1000), &lines)
            .await
            .unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(db.orders().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_place_is_all_or_nothing() {
        let (db, payment_id, product_id) = seeded().await;

        // second line references a product that does not exist
        let lines = [line_for(product_id, 1, 1000), line_for(9999, 1, 1000)];
        let err = db
            .orders()
            .place(&new_order(payment_id, "S200b", 2000), &lines)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert!(db.orders().get_by_receipt_code("S200b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_receipt_download_flag() {
        let (db, payment_id, product_id) = seeded().await;
        let order = db
            .orders()
            .place(&new_order(payment_id, "S310d", 1000), &[line_for(product_id, 1, 1000)])
            .await
            .unwrap();

        assert_eq!(db.orders().receipt_download_status(order.id).await.unwrap(), Some(false));

        sqlx::query("UPDATE orders SET receipt_file_path = ?1 WHERE id = ?2")
            .bind("receipts/S310d.pdf")
            .bind(order.id)
            .execute(db.pool())
            .await
            .unwrap();

        let path = db.orders().mark_receipt_downloaded(order.id).await.unwrap();
        assert_eq!(path.as_deref(), Some("receipts/S310d.pdf"));
        assert_eq!(db.orders().receipt_download_status(order.id).await.unwrap(), Some(true));

        // marking again keeps the flag set
        assert!(db.orders().mark_receipt_downloaded(order.id).await.unwrap().is_some());
        assert_eq!(db.orders().receipt_download_status(order.id).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_receipt_download_missing_order() {
        let db = test_db().await;
        assert!(db.orders().mark_receipt_downloaded(404).await.unwrap().is_none());
        assert!(db.orders().receipt_download_status(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let (db, payment_id, product_id) = seeded().await;
        let lines = [line_for(product_id, 1, 1000)];

        for code in ["S001a", "S002b", "S003c"] {
            db.orders()
                .place(&new_order(payment_id, code, 1000), &lines)
                .await
                .unwrap();
        }

        let page = db.orders().list(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].receipt_id, "S003c");

        let rest = db.orders().list(2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].receipt_id, "S001a");
    }
}
