use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses that take part in recommendation and customer metrics computation.
    pub const QUALIFYING: [OrderStatus; 4] =
        [OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered];

    pub fn qualifies(self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::UnknownLabel { kind: "order status", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Distinct product ids in the order, in first-seen line order.
    pub fn distinct_product_ids(&self) -> Vec<&ProductId> {
        let mut seen = HashSet::new();
        self.lines.iter().map(|line| &line.product_id).filter(|id| seen.insert(*id)).collect()
    }

    pub fn first_product_id(&self) -> Option<&ProductId> {
        self.lines.first().map(|line| &line.product_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Order, OrderId, OrderLine, OrderStatus, UserId};
    use crate::domain::product::ProductId;

    fn line(product: &str, quantity: u32) -> OrderLine {
        OrderLine { product_id: ProductId::new(product), quantity }
    }

    #[test]
    fn cancelled_is_the_only_non_qualifying_status() {
        for status in OrderStatus::QUALIFYING {
            assert!(status.qualifies(), "{status:?} should qualify");
        }
        assert!(!OrderStatus::Cancelled.qualifies());
    }

    #[test]
    fn status_round_trips_through_its_label() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().expect("parse"), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn distinct_product_ids_keeps_first_occurrence_order() {
        let order = Order {
            id: OrderId("ord-1".to_string()),
            user_id: UserId::new("user-1"),
            lines: vec![line("b", 1), line("a", 2), line("b", 4)],
            status: OrderStatus::Delivered,
            total: Decimal::new(1000, 0),
            created_at: Utc::now(),
        };

        let ids: Vec<&str> = order.distinct_product_ids().into_iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(order.first_product_id().map(|id| id.as_str()), Some("b"));
    }
}
