use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use fitstore_core::domain::product::{Product, ProductId};
use fitstore_core::errors::StoreError;
use fitstore_core::stores::ProductStore;

use super::{
    format_timestamp, parse_decimal, parse_timestamp, parse_u32, RepositoryError, BIND_CHUNK,
};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.brand, p.price, p.stock, p.created_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upserts the product and replaces its category tags.
    pub async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO product (id, name, brand, price, stock, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 brand = excluded.brand,
                 price = excluded.price,
                 stock = excluded.stock,
                 created_at = excluded.created_at",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.price.to_string())
        .bind(i64::from(product.stock))
        .bind(format_timestamp(product.created_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM product_category WHERE product_id = ?")
            .bind(&product.id.0)
            .execute(&mut *tx)
            .await?;

        for (position, category) in product.categories.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO product_category (product_id, category, position)
                 VALUES (?, ?, ?)",
            )
            .bind(&product.id.0)
            .bind(category)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Returns whether a row was removed. Order lines referencing the product are kept.
    pub async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_categories(&self, rows: Vec<SqliteRow>) -> Result<Vec<Product>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let mut categories: HashMap<String, Vec<String>> = HashMap::new();
        for chunk in ids.chunks(BIND_CHUNK) {
            let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "SELECT product_id, category FROM product_category WHERE product_id IN (",
            );
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(") ORDER BY product_id, position, category");

            for row in query.build().fetch_all(&self.pool).await? {
                let product_id: String = row
                    .try_get("product_id")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let category: String =
                    row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                categories.entry(product_id).or_default().push(category);
            }
        }

        rows.iter()
            .map(|row| {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let tags = categories.remove(&id).unwrap_or_default();
                row_to_product(row, tags)
            })
            .collect()
    }
}

fn row_to_product(row: &SqliteRow, categories: Vec<String>) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let brand: String = row.try_get("brand").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String = row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stock: i64 = row.try_get("stock").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: ProductId(id),
        name,
        brand,
        price: parse_decimal("price", &price)?,
        categories,
        stock: parse_u32("stock", stock)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait]
impl ProductStore for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Ok(self.attach_categories(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<&str> =
            ids.iter().map(ProductId::as_str).filter(|id| seen.insert(*id)).collect();

        let mut rows = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(BIND_CHUNK) {
            let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id IN ("
            ));
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            rows.extend(query.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?);
        }

        Ok(self.attach_categories(rows).await?)
    }

    async fn find_by_category(
        &self,
        category: &str,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM product p
             JOIN product_category pc ON pc.product_id = p.id
             WHERE pc.category = ? AND (? = 0 OR p.stock > 0)
             ORDER BY p.created_at DESC, p.id ASC"
        ))
        .bind(category)
        .bind(in_stock_only)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(self.attach_categories(rows).await?)
    }

    async fn find_premium(
        &self,
        min_price: Decimal,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM product p
             WHERE CAST(p.price AS REAL) >= CAST(? AS REAL) AND (? = 0 OR p.stock > 0)"
        ))
        .bind(min_price.to_string())
        .bind(in_stock_only)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let mut products = self.attach_categories(rows).await?;
        // REAL comparison is only a prefilter; the exact bound is checked on the decimal.
        products.retain(|product| product.price >= min_price);
        products.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }
}
