use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use fitstore_core::domain::order::{Order, OrderId, OrderLine, OrderStatus, UserId};
use fitstore_core::domain::product::ProductId;
use fitstore_core::errors::StoreError;
use fitstore_core::stores::OrderStore;

use super::{format_timestamp, parse_decimal, parse_label, parse_timestamp, parse_u32, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upserts the order header and rewrites its lines in one transaction.
    pub async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customer_order (id, user_id, status, total, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 user_id = excluded.user_id,
                 status = excluded.status,
                 total = excluded.total,
                 created_at = excluded.created_at",
        )
        .bind(&order.id.0)
        .bind(&order.user_id.0)
        .bind(order.status.as_str())
        .bind(order.total.to_string())
        .bind(format_timestamp(order.created_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_line WHERE order_id = ?")
            .bind(&order.id.0)
            .execute(&mut *tx)
            .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_line (order_id, line_no, product_id, quantity) VALUES (?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(line_no as i64)
            .bind(&line.product_id.0)
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE customer_order SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch(
        &self,
        user_id: Option<&UserId>,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, RepositoryError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        // Headers and lines come from one read snapshot.
        let mut tx = self.pool.begin().await?;

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT o.id, o.user_id, o.status, o.total, o.created_at FROM customer_order o",
        );
        push_order_filter(&mut query, user_id, statuses);
        query.push(" ORDER BY o.created_at ASC, o.id ASC");
        let headers = query.build().fetch_all(&mut *tx).await?;

        if headers.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT ol.order_id, ol.product_id, ol.quantity FROM order_line ol
             JOIN customer_order o ON o.id = ol.order_id",
        );
        push_order_filter(&mut query, user_id, statuses);
        query.push(" ORDER BY ol.order_id, ol.line_no");
        let line_rows = query.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let mut lines = group_lines(line_rows)?;
        headers
            .iter()
            .map(|row| {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let order_lines = lines.remove(&id).unwrap_or_default();
                row_to_order(row, order_lines)
            })
            .collect()
    }
}

/// Appends the status and optional user filter against the `o` alias. Binds stay constant in
/// number no matter how many orders match.
fn push_order_filter<'a>(
    query: &mut QueryBuilder<'a, Sqlite>,
    user_id: Option<&'a UserId>,
    statuses: &'a [OrderStatus],
) {
    query.push(" WHERE o.status IN (");
    let mut separated = query.separated(", ");
    for status in statuses {
        separated.push_bind(status.as_str());
    }
    separated.push_unseparated(")");
    if let Some(user_id) = user_id {
        query.push(" AND o.user_id = ").push_bind(user_id.0.as_str());
    }
}

fn group_lines(rows: Vec<SqliteRow>) -> Result<HashMap<String, Vec<OrderLine>>, RepositoryError> {
    let mut lines: HashMap<String, Vec<OrderLine>> = HashMap::new();
    for row in rows {
        let order_id: String =
            row.try_get("order_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let product_id: String =
            row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let quantity: i64 =
            row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        lines.entry(order_id).or_default().push(OrderLine {
            product_id: ProductId(product_id),
            quantity: parse_u32("quantity", quantity)?,
        });
    }
    Ok(lines)
}

fn row_to_order(row: &SqliteRow, lines: Vec<OrderLine>) -> Result<Order, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total: String = row.try_get("total").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Order {
        id: OrderId(id),
        user_id: UserId(user_id),
        lines,
        status: parse_label("status", &status)?,
        total: parse_decimal("total", &total)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait]
impl OrderStore for SqlOrderRepository {
    async fn find_orders_by_user(
        &self,
        user_id: &UserId,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, StoreError> {
        Ok(self.fetch(Some(user_id), statuses).await?)
    }

    async fn find_orders_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
        Ok(self.fetch(None, statuses).await?)
    }
}
