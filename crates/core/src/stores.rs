//! Read/write seams the recommendation and segmentation engines depend on.
//!
//! Implementations live in `fitstore-db`; the engines only see these traits.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::order::{Order, OrderStatus, UserId};
use crate::domain::product::{Product, ProductId};
use crate::errors::StoreError;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_orders_by_user(
        &self,
        user_id: &UserId,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, StoreError>;

    async fn find_orders_by_status(&self, statuses: &[OrderStatus])
        -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Products that exist among `ids`; missing ids are skipped, order is unspecified.
    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Products tagged with `category`, newest first.
    async fn find_by_category(
        &self,
        category: &str,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError>;

    /// Products priced at or above `min_price`, most expensive first.
    async fn find_premium(
        &self,
        min_price: Decimal,
        in_stock_only: bool,
    ) -> Result<Vec<Product>, StoreError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Customer>, StoreError>;
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StoreError>;
    async fn save(&self, customer: Customer) -> Result<(), StoreError>;
    async fn list_all(&self) -> Result<Vec<Customer>, StoreError>;
}
