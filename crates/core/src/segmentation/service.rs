use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::customer::{Customer, CustomerId, InteractionKind};
use crate::domain::order::{Order, OrderStatus, UserId};
use crate::domain::product::ProductId;
use crate::errors::MetricsError;
use crate::stores::{CustomerStore, OrderStore, ProductStore};

use super::{compute_metrics, rank_preferred_categories};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResyncSummary {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Explicit update pipeline for customer metrics: fetch orders, compute the snapshot, re-derive
/// labels, save. Concurrent refreshes of the same customer are last-write-wins.
pub struct CustomerMetricsService {
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    customers: Arc<dyn CustomerStore>,
}

impl CustomerMetricsService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        customers: Arc<dyn CustomerStore>,
    ) -> Self {
        Self { orders, products, customers }
    }

    /// Returns the user's customer record, creating and saving a fresh one if needed.
    pub async fn ensure_customer(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Customer, MetricsError> {
        if let Some(existing) = self.customers.find_by_user(user_id).await? {
            return Ok(existing);
        }

        let customer = Customer::provision(user_id.clone(), now);
        self.customers.save(customer.clone()).await?;
        info!(
            event_name = "customers.provisioned",
            customer_id = %customer.id,
            user_id = %user_id,
            "customer record provisioned"
        );
        Ok(customer)
    }

    /// Post-order hook: logs the order on the customer's interaction history and refreshes metrics.
    pub async fn record_order(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<Customer, MetricsError> {
        let mut customer = self.ensure_customer(&order.user_id, now).await?;
        customer.record_interaction(
            InteractionKind::OrderPlaced,
            format!("order {} ({})", order.id.0, order.status.as_str()),
            order.created_at,
        );
        self.refresh(&mut customer, now).await?;
        self.customers.save(customer.clone()).await?;
        Ok(customer)
    }

    pub async fn recompute(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Customer, MetricsError> {
        let mut customer = self
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| MetricsError::CustomerNotFound(customer_id.clone()))?;

        self.refresh(&mut customer, now).await?;
        self.customers.save(customer.clone()).await?;
        Ok(customer)
    }

    /// Recomputes every stored customer. A failing customer is logged and counted, the rest of the
    /// batch still runs.
    pub async fn resync_all(&self, now: DateTime<Utc>) -> Result<ResyncSummary, MetricsError> {
        let customers = self.customers.list_all().await?;
        let mut summary = ResyncSummary::default();

        for mut customer in customers {
            summary.processed += 1;
            let before = (customer.segment, customer.churn_risk, customer.loyalty_level);

            let outcome = match self.refresh(&mut customer, now).await {
                Ok(()) => self.customers.save(customer.clone()).await.map_err(MetricsError::from),
                Err(error) => Err(error),
            };

            match outcome {
                Ok(()) => {
                    if before != (customer.segment, customer.churn_risk, customer.loyalty_level) {
                        summary.updated += 1;
                    }
                }
                Err(error) => {
                    summary.failed += 1;
                    warn!(
                        event_name = "customers.resync.failed",
                        customer_id = %customer.id,
                        error = %error,
                        "customer metrics resync failed"
                    );
                }
            }
        }

        info!(
            event_name = "customers.resync.completed",
            processed = summary.processed,
            updated = summary.updated,
            failed = summary.failed,
            "customer metrics resync completed"
        );
        Ok(summary)
    }

    async fn refresh(&self, customer: &mut Customer, now: DateTime<Utc>) -> Result<(), MetricsError> {
        let orders =
            self.orders.find_orders_by_user(&customer.user_id, &OrderStatus::QUALIFYING).await?;

        let mut product_ids: Vec<ProductId> = Vec::new();
        for order in &orders {
            for id in order.distinct_product_ids() {
                if !product_ids.contains(id) {
                    product_ids.push(id.clone());
                }
            }
        }
        let products = if product_ids.is_empty() {
            Vec::new()
        } else {
            self.products.find_by_ids(&product_ids).await?
        };

        let previous_segment = customer.segment;
        customer.apply_metrics(compute_metrics(&orders, now), now);
        customer.preferences.categories = rank_preferred_categories(&orders, &products);

        if customer.segment != previous_segment {
            customer.record_interaction(
                InteractionKind::MetricsRecomputed,
                format!("segment {previous_segment} -> {}", customer.segment),
                now,
            );
        }

        info!(
            event_name = "customers.metrics.refreshed",
            customer_id = %customer.id,
            total_orders = customer.metrics.total_orders,
            segment = customer.segment.as_str(),
            loyalty_level = customer.loyalty_level.as_str(),
            "customer metrics refreshed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::CustomerMetricsService;
    use crate::domain::customer::{ChurnRisk, CustomerId, InteractionKind, LoyaltyLevel, Segment};
    use crate::domain::order::{OrderStatus, UserId};
    use crate::errors::MetricsError;
    use crate::recommendations::fixtures::{base_time, order, product, FixtureStore};

    fn service(store: &Arc<FixtureStore>) -> CustomerMetricsService {
        CustomerMetricsService::new(store.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn ensure_customer_provisions_once() {
        let store = FixtureStore::new();
        let service = service(&store);
        let user = UserId::new("u-ana");

        let first = service.ensure_customer(&user, base_time()).await.expect("provision");
        let second = service.ensure_customer(&user, base_time()).await.expect("lookup");

        assert_eq!(first.id, second.id);
        assert_eq!(first.segment, Segment::Nuevo);
        assert_eq!(first.loyalty_level, LoyaltyLevel::Bronce);
        assert_eq!(first.interactions.len(), 1);
        assert_eq!(first.interactions[0].kind, InteractionKind::Provisioned);
    }

    #[tokio::test]
    async fn record_order_refreshes_metrics_and_preferences() {
        let store = FixtureStore::new();
        store.add_product(product("p-whey", 120_000, &["Proteína"], 10, 30)).await;
        store.add_product(product("p-creatine", 80_000, &["Creatina"], 5, 10)).await;
        let first = order("o-1", "u-ana", OrderStatus::Delivered, &[("p-whey", 1)], 300_000, 20);
        let second =
            order("o-2", "u-ana", OrderStatus::Shipped, &[("p-whey", 2), ("p-creatine", 1)], 400_000, 5);
        let cancelled = order("o-3", "u-ana", OrderStatus::Cancelled, &[("p-creatine", 9)], 900_000, 1);
        store.add_order(first.clone()).await;
        store.add_order(second.clone()).await;
        store.add_order(cancelled).await;
        let service = service(&store);

        service.record_order(&first, base_time()).await.expect("first order");
        let customer = service.record_order(&second, base_time()).await.expect("second order");

        assert_eq!(customer.metrics.total_orders, 2);
        assert_eq!(customer.metrics.total_spent, Decimal::from(700_000));
        assert_eq!(customer.metrics.average_order_value, Decimal::from(350_000));
        assert_eq!(customer.metrics.days_since_last_order, Some(5));
        assert_eq!(customer.segment, Segment::Ocasional);
        assert_eq!(customer.churn_risk, Some(ChurnRisk::Bajo));
        assert_eq!(customer.loyalty_level, LoyaltyLevel::Plata);
        assert_eq!(customer.preferences.top_category(), Some("Proteína"));
        assert!(customer
            .interactions
            .iter()
            .any(|interaction| interaction.kind == InteractionKind::MetricsRecomputed));

        let stored = store.customer(&customer.id).await.expect("saved");
        assert_eq!(stored, customer);
    }

    #[tokio::test]
    async fn recompute_requires_an_existing_customer() {
        let store = FixtureStore::new();
        let service = service(&store);

        let result = service.recompute(&CustomerId::new("cust-missing"), base_time()).await;

        assert!(matches!(result, Err(MetricsError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn recompute_moves_lapsed_customers_to_at_risk() {
        let store = FixtureStore::new();
        store.add_product(product("p-whey", 120_000, &["Proteína"], 10, 30)).await;
        store.add_order(order("o-1", "u-ana", OrderStatus::Delivered, &[("p-whey", 1)], 120_000, 0)).await;
        let service = service(&store);
        let customer = service.ensure_customer(&UserId::new("u-ana"), base_time()).await.expect("provision");

        let later = base_time() + Duration::days(120);
        let refreshed = service.recompute(&customer.id, later).await.expect("recompute");

        assert_eq!(refreshed.metrics.days_since_last_order, Some(120));
        assert_eq!(refreshed.segment, Segment::EnRiesgo);
        assert_eq!(refreshed.churn_risk, Some(ChurnRisk::Medio));
    }

    #[tokio::test]
    async fn resync_counts_failures_and_keeps_going() {
        let store = FixtureStore::new();
        store.add_product(product("p-whey", 120_000, &["Proteína"], 10, 30)).await;
        store.add_order(order("o-1", "u-ana", OrderStatus::Delivered, &[("p-whey", 1)], 120_000, 3)).await;
        let service = service(&store);
        let ana = service.ensure_customer(&UserId::new("u-ana"), base_time()).await.expect("ana");
        let ben = service.ensure_customer(&UserId::new("u-ben"), base_time()).await.expect("ben");
        store.fail_saves_for(ben.id.clone()).await;

        let summary = service.resync_all(base_time()).await.expect("resync");

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 1);
        let stored = store.customer(&ana.id).await.expect("ana stored");
        assert_eq!(stored.segment, Segment::Ocasional);
        assert_eq!(stored.metrics.total_orders, 1);
    }
}
