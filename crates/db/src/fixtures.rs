use serde::Serialize;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo catalog and order history.
///
/// Covers every order status, a cancelled order that must never count, an out-of-stock product,
/// a product tagged with two categories, and users at different points of the lifecycle.
pub struct DemoDataset;

/// Users with orders in the seed data, in id order.
pub const SEED_USER_IDS: &[&str] = &["user-001", "user-002", "user-003", "user-004"];

const SEED_PRODUCT_IDS: &[&str] = &[
    "prod-whey-gold",
    "prod-iso-100",
    "prod-creatine-300",
    "prod-bcaa-211",
    "prod-c4-preworkout",
    "prod-multivit-daily",
    "prod-omega3",
    "prod-protein-bar",
    "prod-shaker-pro",
    "prod-glutamine",
];

const SEED_ORDERS: &[SeedOrderContract] = &[
    SeedOrderContract { id: "ord-1001", user_id: "user-001", status: "delivered", line_count: 3 },
    SeedOrderContract { id: "ord-1002", user_id: "user-001", status: "delivered", line_count: 2 },
    SeedOrderContract { id: "ord-1003", user_id: "user-001", status: "shipped", line_count: 2 },
    SeedOrderContract { id: "ord-1004", user_id: "user-002", status: "delivered", line_count: 2 },
    SeedOrderContract { id: "ord-1005", user_id: "user-002", status: "cancelled", line_count: 1 },
    SeedOrderContract { id: "ord-1006", user_id: "user-003", status: "pending", line_count: 2 },
    SeedOrderContract { id: "ord-1007", user_id: "user-004", status: "delivered", line_count: 2 },
    SeedOrderContract { id: "ord-1008", user_id: "user-003", status: "processing", line_count: 2 },
];

const SEED_CATEGORY_TAGS: i64 = 11;

impl DemoDataset {
    /// SQL fixture content for the demo dataset.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset. Loading twice is a no-op.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products: SEED_PRODUCT_IDS.len(),
            orders: SEED_ORDERS.len(),
            users: SEED_USER_IDS.to_vec(),
        })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let quoted_products = sql_array_from_ids(SEED_PRODUCT_IDS);
        let product_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM product WHERE id IN {quoted_products}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("products", product_count == SEED_PRODUCT_IDS.len() as i64));

        let tag_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM product_category WHERE product_id IN {quoted_products}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("product-categories", tag_count == SEED_CATEGORY_TAGS));

        for order in SEED_ORDERS {
            let header_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM customer_order WHERE id = ?1 AND user_id = ?2 AND status = ?3)",
            )
            .bind(order.id)
            .bind(order.user_id)
            .bind(order.status)
            .fetch_one(pool)
            .await?;
            checks.push((order.id, header_ok == 1));

            let line_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM order_line WHERE order_id = ?1")
                    .bind(order.id)
                    .fetch_one(pool)
                    .await?;
            checks.push(("order-lines", line_count == order.line_count));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove seeded rows, including customer profiles derived from them.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_users = sql_array_from_ids(SEED_USER_IDS);
        let quoted_products = sql_array_from_ids(SEED_PRODUCT_IDS);
        let order_ids: Vec<&str> = SEED_ORDERS.iter().map(|order| order.id).collect();
        let quoted_orders = sql_array_from_ids(&order_ids);

        sqlx::query(&format!("DELETE FROM customer WHERE user_id IN {quoted_users}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM customer_order WHERE id IN {quoted_orders}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM product WHERE id IN {quoted_products}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedOrderContract {
    id: &'static str,
    user_id: &'static str,
    status: &'static str,
    line_count: i64,
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub products: usize,
    pub orders: usize,
    pub users: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoDataset::SQL.is_empty());
        for id in SEED_PRODUCT_IDS {
            assert!(DemoDataset::SQL.contains(id), "fixture should insert {id}");
        }
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.products, 10);
        assert_eq!(first.orders, 8);

        DemoDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoDataset::verify(&pool).await.expect("re-verify");
        assert!(second_verification.all_present);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoDataset::load(&pool).await.expect("load seed fixtures");

        DemoDataset::clean(&pool).await.expect("clean");

        let lines: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM order_line")
            .fetch_one(&pool)
            .await
            .expect("count lines");
        assert_eq!(lines, 0, "order lines cascade with their orders");
        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
    }
}
