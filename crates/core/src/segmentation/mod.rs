//! Customer metrics and rule-based segmentation.
//!
//! Every label on a [`Customer`](crate::domain::customer::Customer) is a pure function of its
//! [`CustomerMetrics`] snapshot. Running [`classify`] twice on the same snapshot always yields the
//! same result; nothing here reads the previous labels.

mod service;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::customer::{ChurnRisk, CustomerMetrics, LoyaltyLevel, Segment};
use crate::domain::order::Order;
use crate::domain::product::{Product, ProductId};

pub use service::{CustomerMetricsService, ResyncSummary};

/// Lifetime spend at which a customer is flagged high value.
pub const HIGH_VALUE_THRESHOLD: i64 = 1_000_000;

/// Lifetime spend required (together with [`VIP_MIN_ORDERS`]) for the VIP segment.
pub const VIP_MIN_LIFETIME_VALUE: i64 = 2_000_000;
pub const VIP_MIN_ORDERS: u32 = 10;

pub const FREQUENT_MIN_ORDERS: u32 = 5;
pub const FREQUENT_MAX_DAYS: i64 = 30;
pub const OCCASIONAL_MIN_ORDERS: u32 = 2;
pub const OCCASIONAL_MAX_DAYS: i64 = 90;
pub const AT_RISK_AFTER_DAYS: i64 = 90;
pub const INACTIVE_AFTER_DAYS: i64 = 180;

/// Loyalty tiers by minimum lifetime spend, highest first.
pub const LOYALTY_THRESHOLDS: [(i64, LoyaltyLevel); 4] = [
    (5_000_000, LoyaltyLevel::Diamante),
    (3_000_000, LoyaltyLevel::Platino),
    (1_500_000, LoyaltyLevel::Oro),
    (500_000, LoyaltyLevel::Plata),
];

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerClassification {
    pub segment: Segment,
    pub churn_risk: Option<ChurnRisk>,
    pub loyalty_level: LoyaltyLevel,
    pub lifetime_value: Decimal,
    pub is_high_value: bool,
}

/// Builds the metrics snapshot from a customer's orders. Cancelled orders are ignored even if the
/// caller passes them in.
pub fn compute_metrics(orders: &[Order], now: DateTime<Utc>) -> CustomerMetrics {
    let qualifying = orders.iter().filter(|order| order.status.qualifies());

    let mut total_orders = 0u32;
    let mut total_spent = Decimal::ZERO;
    let mut last_order_date: Option<DateTime<Utc>> = None;

    for order in qualifying {
        total_orders += 1;
        total_spent += order.total;
        last_order_date = Some(match last_order_date {
            Some(current) if current >= order.created_at => current,
            _ => order.created_at,
        });
    }

    let average_order_value = if total_orders == 0 {
        Decimal::ZERO
    } else {
        (total_spent / Decimal::from(total_orders)).round_dp(2)
    };

    CustomerMetrics {
        total_orders,
        total_spent,
        average_order_value,
        last_order_date,
        days_since_last_order: last_order_date.map(|last| days_since(last, now)),
    }
}

/// Whole days elapsed, rounded up: one minute after an order already counts as day 1.
pub fn days_since(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - then).num_milliseconds() as f64;
    (elapsed / MILLIS_PER_DAY).ceil() as i64
}

/// First matching rule wins; the rule order is significant.
pub fn derive_segment(metrics: &CustomerMetrics) -> Segment {
    let days = metrics.days_since_last_order;
    let lifetime_value = metrics.total_spent;

    if metrics.total_orders == 0 {
        Segment::Nuevo
    } else if lifetime_value >= Decimal::from(VIP_MIN_LIFETIME_VALUE)
        && metrics.total_orders >= VIP_MIN_ORDERS
    {
        Segment::Vip
    } else if metrics.total_orders >= FREQUENT_MIN_ORDERS
        && days.is_some_and(|days| days <= FREQUENT_MAX_DAYS)
    {
        Segment::Frecuente
    } else if metrics.total_orders >= OCCASIONAL_MIN_ORDERS
        && days.is_some_and(|days| days <= OCCASIONAL_MAX_DAYS)
    {
        Segment::Ocasional
    } else if days.is_some_and(|days| days > INACTIVE_AFTER_DAYS) {
        Segment::Inactivo
    } else if days.is_some_and(|days| days > AT_RISK_AFTER_DAYS) {
        Segment::EnRiesgo
    } else {
        Segment::Ocasional
    }
}

pub fn derive_churn_risk(metrics: &CustomerMetrics) -> Option<ChurnRisk> {
    if metrics.total_orders == 0 {
        return None;
    }

    match metrics.days_since_last_order {
        Some(days) if days > INACTIVE_AFTER_DAYS => Some(ChurnRisk::Alto),
        Some(days) if days > AT_RISK_AFTER_DAYS => Some(ChurnRisk::Medio),
        _ => Some(ChurnRisk::Bajo),
    }
}

pub fn derive_loyalty(lifetime_value: Decimal) -> LoyaltyLevel {
    LOYALTY_THRESHOLDS
        .iter()
        .find(|(threshold, _)| lifetime_value >= Decimal::from(*threshold))
        .map(|(_, level)| *level)
        .unwrap_or(LoyaltyLevel::Bronce)
}

pub fn is_high_value(lifetime_value: Decimal) -> bool {
    lifetime_value >= Decimal::from(HIGH_VALUE_THRESHOLD)
}

pub fn classify(metrics: &CustomerMetrics) -> CustomerClassification {
    let lifetime_value = metrics.total_spent;
    CustomerClassification {
        segment: derive_segment(metrics),
        churn_risk: derive_churn_risk(metrics),
        loyalty_level: derive_loyalty(lifetime_value),
        lifetime_value,
        is_high_value: is_high_value(lifetime_value),
    }
}

/// Ranks categories by purchased quantity across qualifying orders, most bought first and ties
/// by name. Lines whose product no longer exists are skipped.
pub fn rank_preferred_categories(orders: &[Order], products: &[Product]) -> Vec<String> {
    let catalog: HashMap<&ProductId, &Product> =
        products.iter().map(|product| (&product.id, product)).collect();

    let mut quantities: HashMap<&str, u64> = HashMap::new();
    for order in orders.iter().filter(|order| order.status.qualifies()) {
        for line in &order.lines {
            let Some(product) = catalog.get(&line.product_id) else {
                continue;
            };
            for category in &product.categories {
                *quantities.entry(category.as_str()).or_default() += u64::from(line.quantity);
            }
        }
    }

    let mut ranked: Vec<(&str, u64)> = quantities.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().map(|(category, _)| category.to_string()).collect()
}
