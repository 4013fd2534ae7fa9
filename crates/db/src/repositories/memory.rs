use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use fitstore_core::domain::customer::{Customer, CustomerId};
use fitstore_core::domain::order::{Order, OrderStatus, UserId};
use fitstore_core::domain::product::{Product, ProductId};
use fitstore_core::errors::StoreError;
use fitstore_core::stores::{CustomerStore, OrderStore, ProductStore};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub async fn save(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
    }

    async fn filtered(&self, predicate: impl Fn(&Order) -> bool) -> Vec<Order> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders.values().filter(|order| predicate(order)).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        matching
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderRepository {
    async fn find_orders_by_user(
        &self,
        user_id: &UserId,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .filtered(|order| &order.user_id == user_id && statuses.contains(&order.status))
            .await)
    }

    async fn find_orders_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
        Ok(self.filtered(|order| statuses.contains(&order.status)).await)
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryProductRepository {
    pub async fn save(&self, product: Product) {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
    }

    pub async fn delete(&self, id: &ProductId) -> bool {
        let mut products = self.products.write().await;
        products.remove(&id.0).is_some()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(&id.0).cloned()).collect())
    }

    async fn find_by_category(
        &self,
        category: &str,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().await;
        let mut matching: Vec<Product> = products
            .values()
            .filter(|product| product.in_category(category))
            .filter(|product| !in_stock_only || product.is_in_stock())
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn find_premium(
        &self,
        min_price: Decimal,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().await;
        let mut matching: Vec<Product> = products
            .values()
            .filter(|product| product.price >= min_price)
            .filter(|product| !in_stock_only || product.is_in_stock())
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait]
impl CustomerStore for InMemoryCustomerRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Customer>, StoreError> {
        let customers = self.customers.read().await;
        Ok(customers.values().find(|customer| &customer.user_id == user_id).cloned())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn save(&self, mut customer: Customer) -> Result<(), StoreError> {
        let mut customers = self.customers.write().await;
        if let Some(stored) = customers.get(&customer.id.0) {
            let mut log = stored.interactions.clone();
            for entry in customer.interactions.drain(..) {
                if !log.contains(&entry) {
                    log.push(entry);
                }
            }
            customer.interactions = log;
        }
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError> {
        let customers = self.customers.read().await;
        let mut all: Vec<Customer> = customers.values().cloned().collect();
        all.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(all)
    }
}
