//! In-memory stores and builders shared by the engine and metrics tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::config::RecommendationConfig;
use crate::domain::customer::{Customer, CustomerId};
use crate::domain::order::{Order, OrderId, OrderLine, OrderStatus, UserId};
use crate::domain::product::{Product, ProductId};
use crate::errors::StoreError;
use crate::stores::{CustomerStore, OrderStore, ProductStore};

use super::RecommendationEngine;

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid fixture time")
}

pub(crate) fn product(id: &str, price: i64, categories: &[&str], stock: u32, age_days: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        brand: "FitLab".to_owned(),
        price: Decimal::from(price),
        categories: categories.iter().map(|category| (*category).to_owned()).collect(),
        stock,
        created_at: base_time() - Duration::days(age_days),
    }
}

pub(crate) fn order(
    id: &str,
    user: &str,
    status: OrderStatus,
    lines: &[(&str, u32)],
    total: i64,
    days_ago: i64,
) -> Order {
    Order {
        id: OrderId(id.to_owned()),
        user_id: UserId::new(user),
        lines: lines
            .iter()
            .map(|(product_id, quantity)| OrderLine {
                product_id: ProductId::new(*product_id),
                quantity: *quantity,
            })
            .collect(),
        status,
        total: Decimal::from(total),
        created_at: base_time() - Duration::days(days_ago),
    }
}

#[derive(Default)]
pub(crate) struct FixtureStore {
    products: RwLock<HashMap<ProductId, Product>>,
    orders: RwLock<Vec<Order>>,
    customers: RwLock<HashMap<CustomerId, Customer>>,
    failing: AtomicBool,
    failing_customer_saves: RwLock<Vec<CustomerId>>,
}

impl FixtureStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) async fn add_product(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    pub(crate) async fn remove_product(&self, id: &str) {
        self.products.write().await.remove(&ProductId::new(id));
    }

    pub(crate) async fn add_order(&self, order: Order) {
        self.orders.write().await.push(order);
    }

    pub(crate) async fn add_customer(&self, customer: Customer) {
        self.customers.write().await.insert(customer.id.clone(), customer);
    }

    pub(crate) async fn customer(&self, id: &CustomerId) -> Option<Customer> {
        self.customers.read().await.get(id).cloned()
    }

    pub(crate) fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn fail_saves_for(&self, id: CustomerId) {
        self.failing_customer_saves.write().await.push(id);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::message("fixture store offline"));
        }
        Ok(())
    }

    pub(crate) fn engine(self: &Arc<Self>, config: RecommendationConfig) -> RecommendationEngine {
        RecommendationEngine::new(self.clone(), self.clone(), self.clone(), config)
    }
}

#[async_trait]
impl OrderStore for FixtureStore {
    async fn find_orders_by_user(
        &self,
        user_id: &UserId,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, StoreError> {
        self.check()?;
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|order| &order.user_id == user_id && statuses.contains(&order.status))
            .cloned()
            .collect())
    }

    async fn find_orders_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
        self.check()?;
        let orders = self.orders.read().await;
        Ok(orders.iter().filter(|order| statuses.contains(&order.status)).cloned().collect())
    }
}

#[async_trait]
impl ProductStore for FixtureStore {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        self.check()?;
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        self.check()?;
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn find_by_category(
        &self,
        category: &str,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        self.check()?;
        let products = self.products.read().await;
        let mut matching: Vec<Product> = products
            .values()
            .filter(|product| product.in_category(category))
            .filter(|product| !in_stock_only || product.is_in_stock())
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn find_premium(
        &self,
        min_price: Decimal,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        self.check()?;
        let products = self.products.read().await;
        let mut matching: Vec<Product> = products
            .values()
            .filter(|product| product.price >= min_price)
            .filter(|product| !in_stock_only || product.is_in_stock())
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.price.cmp(&a.price));
        Ok(matching)
    }
}

#[async_trait]
impl CustomerStore for FixtureStore {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Customer>, StoreError> {
        self.check()?;
        let customers = self.customers.read().await;
        Ok(customers.values().find(|customer| &customer.user_id == user_id).cloned())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        self.check()?;
        Ok(self.customers.read().await.get(id).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), StoreError> {
        self.check()?;
        if self.failing_customer_saves.read().await.contains(&customer.id) {
            return Err(StoreError::message(format!("cannot save {}", customer.id)));
        }
        self.customers.write().await.insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError> {
        self.check()?;
        let mut customers: Vec<Customer> = self.customers.read().await.values().cloned().collect();
        customers.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(customers)
    }
}
