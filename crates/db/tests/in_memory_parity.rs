use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use fitstore_core::config::RecommendationConfig;
use fitstore_core::domain::order::{OrderStatus, UserId};
use fitstore_core::domain::product::ProductId;
use fitstore_core::recommendations::{HybridOptions, Recommendation, RecommendationEngine};
use fitstore_core::segmentation::CustomerMetricsService;
use fitstore_core::stores::{CustomerStore, OrderStore, ProductStore};
use fitstore_db::{
    connect_with_settings, migrations, DemoDataset, InMemoryCustomerRepository,
    InMemoryOrderRepository, InMemoryProductRepository, SqlCustomerRepository, SqlOrderRepository,
    SqlProductRepository, SEED_USER_IDS,
};

type FlowResult<T = ()> = Result<T, String>;

const ALL_STATUSES: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).single().expect("valid clock")
}

struct Stack {
    customers: Arc<dyn CustomerStore>,
    engine: RecommendationEngine,
}

impl Stack {
    async fn provisioned(
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        customers: Arc<dyn CustomerStore>,
    ) -> FlowResult<Self> {
        let service = CustomerMetricsService::new(orders.clone(), products.clone(), customers.clone());
        for user in SEED_USER_IDS {
            service.ensure_customer(&UserId::new(*user), now()).await.map_err(|e| e.to_string())?;
        }
        service.resync_all(now()).await.map_err(|e| e.to_string())?;

        let engine = RecommendationEngine::new(
            orders,
            products,
            customers.clone(),
            RecommendationConfig::default(),
        );
        Ok(Self { customers, engine })
    }
}

/// The demo dataset loaded into SQLite, and the same rows copied into the in-memory stores.
async fn sql_and_memory_stacks() -> FlowResult<(Stack, Stack)> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    DemoDataset::load(&pool).await.map_err(|e| e.to_string())?;

    let sql_orders = Arc::new(SqlOrderRepository::new(pool.clone()));
    let sql_products = Arc::new(SqlProductRepository::new(pool.clone()));

    let memory_orders = Arc::new(InMemoryOrderRepository::default());
    for order in sql_orders.find_orders_by_status(&ALL_STATUSES).await.map_err(|e| e.to_string())? {
        memory_orders.save(order).await;
    }

    let product_ids: Vec<ProductId> = sqlx::query_scalar::<_, String>("SELECT id FROM product")
        .fetch_all(&pool)
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(ProductId::new)
        .collect();
    let memory_products = Arc::new(InMemoryProductRepository::default());
    for product in sql_products.find_by_ids(&product_ids).await.map_err(|e| e.to_string())? {
        memory_products.save(product).await;
    }

    let sql = Stack::provisioned(
        sql_orders,
        sql_products,
        Arc::new(SqlCustomerRepository::new(pool.clone())),
    )
    .await?;
    let memory = Stack::provisioned(
        memory_orders,
        memory_products,
        Arc::new(InMemoryCustomerRepository::default()),
    )
    .await?;
    Ok((sql, memory))
}

fn ids(recommendations: &[Recommendation]) -> Vec<String> {
    recommendations.iter().map(|recommendation| recommendation.product_id().to_string()).collect()
}

#[tokio::test]
async fn in_memory_stores_rank_like_sqlite() -> FlowResult {
    let (sql, memory) = sql_and_memory_stacks().await?;

    let popular = (
        sql.engine.popular(5).await.map_err(|e| e.to_string())?,
        memory.engine.popular(5).await.map_err(|e| e.to_string())?,
    );
    assert_eq!(ids(&popular.0), ids(&popular.1));
    assert_eq!(popular.0[0].total_quantity, popular.1[0].total_quantity);

    let whey = ProductId::new("prod-whey-gold");
    let item = (
        sql.engine.item_based(&whey, 4).await.map_err(|e| e.to_string())?,
        memory.engine.item_based(&whey, 4).await.map_err(|e| e.to_string())?,
    );
    assert_eq!(ids(&item.0), ids(&item.1));

    let user = UserId::new("user-004");
    let history = (
        sql.engine.user_based(&user, 5).await.map_err(|e| e.to_string())?,
        memory.engine.user_based(&user, 5).await.map_err(|e| e.to_string())?,
    );
    assert_eq!(ids(&history.0), ids(&history.1));

    let category = (
        sql.engine.by_category("Proteína", 5).await.map_err(|e| e.to_string())?,
        memory.engine.by_category("Proteína", 5).await.map_err(|e| e.to_string())?,
    );
    assert_eq!(ids(&category.0), ids(&category.1));
    Ok(())
}

#[tokio::test]
async fn in_memory_customers_classify_and_profile_like_sqlite() -> FlowResult {
    let (sql, memory) = sql_and_memory_stacks().await?;

    for user in SEED_USER_IDS {
        let user = UserId::new(*user);
        let stored = sql.customers.find_by_user(&user).await.map_err(|e| e.to_string())?;
        let cached = memory.customers.find_by_user(&user).await.map_err(|e| e.to_string())?;
        let (stored, cached) = stored.zip(cached).ok_or_else(|| format!("{user} missing"))?;

        assert_eq!(stored.segment, cached.segment, "{user} segment");
        assert_eq!(stored.loyalty_level, cached.loyalty_level, "{user} loyalty");
        assert_eq!(stored.metrics, cached.metrics, "{user} metrics");
        assert_eq!(stored.interactions.len(), cached.interactions.len(), "{user} log");

        let options = HybridOptions::with_limit(10);
        let sql_profile = sql
            .engine
            .hybrid_at(&stored.id, options, now())
            .await
            .map_err(|e| e.to_string())?;
        let memory_profile = memory
            .engine
            .hybrid_at(&cached.id, options, now())
            .await
            .map_err(|e| e.to_string())?;

        for ((label, left), (_, right)) in
            sql_profile.buckets().into_iter().zip(memory_profile.buckets())
        {
            assert_eq!(ids(left), ids(right), "{user} {label}");
        }
        assert_eq!(sql_profile.total_recommendations, memory_profile.total_recommendations);
    }
    Ok(())
}
