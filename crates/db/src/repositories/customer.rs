use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use fitstore_core::domain::customer::{
    Customer, CustomerId, CustomerInteraction, CustomerMetrics, CustomerPreferences,
};
use fitstore_core::domain::order::UserId;
use fitstore_core::errors::StoreError;
use fitstore_core::stores::CustomerStore;

use super::{
    format_timestamp, parse_decimal, parse_label, parse_optional_timestamp, parse_timestamp,
    parse_u32, RepositoryError,
};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id, user_id, segment, loyalty_level, churn_risk, lifetime_value,
    is_high_value, total_orders, total_spent, average_order_value, last_order_date,
    days_since_last_order, preferred_categories, created_at, updated_at";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn upsert(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let preferred_categories = serde_json::to_string(&customer.preferences.categories)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customer (id, user_id, segment, loyalty_level, churn_risk, lifetime_value,
                                   is_high_value, total_orders, total_spent, average_order_value,
                                   last_order_date, days_since_last_order, preferred_categories,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 segment = excluded.segment,
                 loyalty_level = excluded.loyalty_level,
                 churn_risk = excluded.churn_risk,
                 lifetime_value = excluded.lifetime_value,
                 is_high_value = excluded.is_high_value,
                 total_orders = excluded.total_orders,
                 total_spent = excluded.total_spent,
                 average_order_value = excluded.average_order_value,
                 last_order_date = excluded.last_order_date,
                 days_since_last_order = excluded.days_since_last_order,
                 preferred_categories = excluded.preferred_categories,
                 updated_at = excluded.updated_at",
        )
        .bind(&customer.id.0)
        .bind(&customer.user_id.0)
        .bind(customer.segment.as_str())
        .bind(customer.loyalty_level.as_str())
        .bind(customer.churn_risk.map(|risk| risk.as_str()))
        .bind(customer.lifetime_value.to_string())
        .bind(customer.is_high_value)
        .bind(i64::from(customer.metrics.total_orders))
        .bind(customer.metrics.total_spent.to_string())
        .bind(customer.metrics.average_order_value.to_string())
        .bind(customer.metrics.last_order_date.map(format_timestamp))
        .bind(customer.metrics.days_since_last_order)
        .bind(preferred_categories)
        .bind(format_timestamp(customer.created_at))
        .bind(format_timestamp(customer.updated_at))
        .execute(&mut *tx)
        .await?;

        // Append-only: stored entries are skipped and new ones take the next sequence number.
        for interaction in &customer.interactions {
            let occurred_at = format_timestamp(interaction.occurred_at);
            sqlx::query(
                "INSERT INTO customer_interaction (customer_id, seq, kind, description, occurred_at)
                 SELECT ?1, (SELECT COALESCE(MAX(seq), -1) + 1 FROM customer_interaction
                             WHERE customer_id = ?1), ?2, ?3, ?4
                 WHERE NOT EXISTS (
                     SELECT 1 FROM customer_interaction
                     WHERE customer_id = ?1 AND kind = ?2 AND description = ?3 AND occurred_at = ?4
                 )",
            )
            .bind(&customer.id.0)
            .bind(interaction.kind.as_str())
            .bind(&interaction.description)
            .bind(occurred_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Customer>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE {column} = ?"))
            .bind(value)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let mut interactions = load_interactions(&mut *tx, Some(&id)).await?;
        tx.commit().await?;
        row_to_customer(&row, interactions.remove(&id).unwrap_or_default()).map(Some)
    }

    async fn list(&self) -> Result<Vec<Customer>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer ORDER BY id"))
            .fetch_all(&mut *tx)
            .await?;
        let mut interactions = load_interactions(&mut *tx, None).await?;
        tx.commit().await?;

        rows.iter()
            .map(|row| {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let history = interactions.remove(&id).unwrap_or_default();
                row_to_customer(row, history)
            })
            .collect()
    }
}

/// Interactions of one customer, or of every customer when `customer_id` is `None`.
async fn load_interactions(
    conn: &mut SqliteConnection,
    customer_id: Option<&str>,
) -> Result<HashMap<String, Vec<CustomerInteraction>>, RepositoryError> {
    let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
        "SELECT customer_id, kind, description, occurred_at FROM customer_interaction",
    );
    if let Some(customer_id) = customer_id {
        query.push(" WHERE customer_id = ").push_bind(customer_id);
    }
    query.push(" ORDER BY customer_id, seq");

    let mut interactions: HashMap<String, Vec<CustomerInteraction>> = HashMap::new();
    for row in query.build().fetch_all(&mut *conn).await? {
        let customer_id: String =
            row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let kind: String =
            row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let description: String =
            row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let occurred_at: String =
            row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        interactions.entry(customer_id).or_default().push(CustomerInteraction {
            kind: parse_label("kind", &kind)?,
            description,
            occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
        });
    }
    Ok(interactions)
}

fn row_to_customer(
    row: &SqliteRow,
    interactions: Vec<CustomerInteraction>,
) -> Result<Customer, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let segment: String =
        row.try_get("segment").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let loyalty_level: String =
        row.try_get("loyalty_level").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let churn_risk: Option<String> =
        row.try_get("churn_risk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let lifetime_value: String =
        row.try_get("lifetime_value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_high_value: bool =
        row.try_get("is_high_value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_orders: i64 =
        row.try_get("total_orders").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_spent: String =
        row.try_get("total_spent").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let average_order_value: String =
        row.try_get("average_order_value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_order_date: Option<String> =
        row.try_get("last_order_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let days_since_last_order: Option<i64> =
        row.try_get("days_since_last_order").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferred_categories: String =
        row.try_get("preferred_categories").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let categories: Vec<String> = serde_json::from_str(&preferred_categories).map_err(|e| {
        RepositoryError::Decode(format!("invalid `preferred_categories` json: {e}"))
    })?;

    Ok(Customer {
        id: CustomerId(id),
        user_id: UserId(user_id),
        segment: parse_label("segment", &segment)?,
        loyalty_level: parse_label("loyalty_level", &loyalty_level)?,
        churn_risk: churn_risk.map(|risk| parse_label("churn_risk", &risk)).transpose()?,
        lifetime_value: parse_decimal("lifetime_value", &lifetime_value)?,
        is_high_value,
        metrics: CustomerMetrics {
            total_orders: parse_u32("total_orders", total_orders)?,
            total_spent: parse_decimal("total_spent", &total_spent)?,
            average_order_value: parse_decimal("average_order_value", &average_order_value)?,
            last_order_date: parse_optional_timestamp("last_order_date", last_order_date)?,
            days_since_last_order,
        },
        preferences: CustomerPreferences { categories },
        interactions,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl CustomerStore for SqlCustomerRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Customer>, StoreError> {
        Ok(self.find_one("user_id", &user_id.0).await?)
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.find_one("id", &id.0).await?)
    }

    async fn save(&self, customer: Customer) -> Result<(), StoreError> {
        Ok(self.upsert(&customer).await?)
    }

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError> {
        Ok(self.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use fitstore_core::domain::customer::{
        ChurnRisk, Customer, CustomerId, CustomerMetrics, InteractionKind, LoyaltyLevel, Segment,
    };
    use fitstore_core::domain::order::UserId;
    use fitstore_core::stores::CustomerStore;

    use super::SqlCustomerRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn at_risk_customer(id: &str, user: &str) -> Customer {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("time");
        let mut customer = Customer::provision(UserId::new(user), base);
        customer.id = CustomerId::new(id);
        customer.apply_metrics(
            CustomerMetrics {
                total_orders: 1,
                total_spent: Decimal::new(1_250_050, 1),
                average_order_value: Decimal::new(1_250_050, 1),
                last_order_date: Some(base - Duration::days(120)),
                days_since_last_order: Some(120),
            },
            base,
        );
        customer.preferences.categories = vec!["Proteína".to_string(), "Snacks".to_string()];
        customer.record_interaction(InteractionKind::MetricsRecomputed, "segment Nuevo -> En Riesgo", base);
        customer
    }

    #[tokio::test]
    async fn save_and_find_round_trips_every_field() {
        let repo = SqlCustomerRepository::new(setup().await);
        let customer = at_risk_customer("cust-1", "u-ana");
        assert_eq!(customer.segment, Segment::EnRiesgo);
        assert_eq!(customer.churn_risk, Some(ChurnRisk::Medio));

        repo.save(customer.clone()).await.expect("save");

        let by_id = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        assert_eq!(by_id, customer);
        let by_user = repo.find_by_user(&customer.user_id).await.expect("find").expect("exists");
        assert_eq!(by_user, customer);
    }

    #[tokio::test]
    async fn save_upserts_labels_and_interactions() {
        let repo = SqlCustomerRepository::new(setup().await);
        let mut customer = at_risk_customer("cust-1", "u-ana");
        repo.save(customer.clone()).await.expect("save");

        customer.loyalty_level = LoyaltyLevel::Oro;
        customer.record_interaction(InteractionKind::OrderPlaced, "order o-9 (pending)", customer.updated_at);
        repo.save(customer.clone()).await.expect("upsert");

        let found = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        assert_eq!(found.loyalty_level, LoyaltyLevel::Oro);
        assert_eq!(found.interactions.len(), 3);
        assert_eq!(found.interactions[2].kind, InteractionKind::OrderPlaced);
    }

    #[tokio::test]
    async fn list_all_returns_customers_sorted_by_id() {
        let repo = SqlCustomerRepository::new(setup().await);
        repo.save(at_risk_customer("cust-b", "u-b")).await.expect("save");
        repo.save(at_risk_customer("cust-a", "u-a")).await.expect("save");

        let all = repo.list_all().await.expect("list");
        let ids: Vec<&str> = all.iter().map(|customer| customer.id.0.as_str()).collect();
        assert_eq!(ids, vec!["cust-a", "cust-b"]);
        assert!(repo.find_by_id(&CustomerId::new("cust-z")).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn stale_copies_append_without_dropping_each_other() {
        let repo = SqlCustomerRepository::new(setup().await);
        let customer = at_risk_customer("cust-1", "u-ana");
        repo.save(customer.clone()).await.expect("save");

        let mut first = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        let mut second = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        let later = customer.updated_at + Duration::hours(1);
        first.record_interaction(InteractionKind::OrderPlaced, "order o-A (delivered)", later);
        second.record_interaction(
            InteractionKind::OrderPlaced,
            "order o-B (pending)",
            later + Duration::minutes(5),
        );
        repo.save(first).await.expect("save first");
        repo.save(second).await.expect("save second");

        let found = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        let descriptions: Vec<&str> =
            found.interactions.iter().map(|entry| entry.description.as_str()).collect();
        assert_eq!(descriptions.len(), 4);
        assert_eq!(&descriptions[2..], &["order o-A (delivered)", "order o-B (pending)"]);

        repo.save(found.clone()).await.expect("save unchanged");
        let again = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        assert_eq!(again.interactions, found.interactions);
    }

    #[tokio::test]
    async fn list_all_handles_more_customers_than_sqlite_bind_limit() {
        let pool = setup().await;
        sqlx::query(
            "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33000)
             INSERT INTO customer (id, user_id, segment, loyalty_level, lifetime_value, total_spent,
                                   average_order_value, created_at, updated_at)
             SELECT printf('cust-%05d', n), printf('u-%05d', n), 'Nuevo', 'Bronce', '0', '0', '0',
                    '2026-03-01T12:00:00.000000Z', '2026-03-01T12:00:00.000000Z'
             FROM seq",
        )
        .execute(&pool)
        .await
        .expect("bulk customers");
        sqlx::query(
            "INSERT INTO customer_interaction (customer_id, seq, kind, description, occurred_at)
             SELECT id, 0, 'provisioned', 'customer created', created_at FROM customer",
        )
        .execute(&pool)
        .await
        .expect("bulk interactions");

        let all = SqlCustomerRepository::new(pool).list_all().await.expect("list");

        assert_eq!(all.len(), 33_000);
        assert_eq!(all[0].id.0, "cust-00001");
        assert!(all.iter().all(|customer| customer.interactions.len() == 1));
    }
}
