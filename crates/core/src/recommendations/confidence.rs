//! Confidence score for hybrid recommendations

use chrono::{DateTime, Utc};

use crate::domain::customer::{Customer, LoyaltyLevel, Segment};
use crate::segmentation::days_since;

/// Score reported when none of the factors below trigger.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const ORDER_FACTOR_WEIGHT: f64 = 0.3;
const ORDER_FACTOR_SATURATION: f64 = 10.0;
const SEGMENT_WEIGHT: f64 = 0.25;
const RECENT_ORDER_WEIGHT: f64 = 0.2;
const RECENT_ORDER_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceInputs {
    pub total_orders: u32,
    pub segment: Option<Segment>,
    pub loyalty_level: Option<LoyaltyLevel>,
    pub days_since_last_order: Option<i64>,
}

impl ConfidenceInputs {
    /// Recency is measured against `now` rather than the stored snapshot so a stale record does
    /// not look recent.
    pub fn for_customer(customer: &Customer, now: DateTime<Utc>) -> Self {
        let days_since_last_order = customer
            .metrics
            .last_order_date
            .map(|last| days_since(last, now))
            .or(customer.metrics.days_since_last_order);

        Self {
            total_orders: customer.metrics.total_orders,
            segment: Some(customer.segment),
            loyalty_level: Some(customer.loyalty_level),
            days_since_last_order,
        }
    }
}

pub fn loyalty_bonus(level: LoyaltyLevel) -> f64 {
    match level {
        LoyaltyLevel::Bronce => 0.0,
        LoyaltyLevel::Plata => 0.10,
        LoyaltyLevel::Oro => 0.15,
        LoyaltyLevel::Platino => 0.20,
        LoyaltyLevel::Diamante => 0.25,
    }
}

/// Sums independently triggered factors. When nothing triggers the result is
/// [`DEFAULT_CONFIDENCE`], not zero.
pub fn confidence_score(inputs: &ConfidenceInputs) -> f64 {
    let mut score = 0.0;
    let mut triggered = false;

    if inputs.total_orders > 0 {
        score += (f64::from(inputs.total_orders) / ORDER_FACTOR_SATURATION).min(1.0)
            * ORDER_FACTOR_WEIGHT;
        triggered = true;
    }

    if inputs.segment.is_some_and(|segment| segment != Segment::Nuevo) {
        score += SEGMENT_WEIGHT;
        triggered = true;
    }

    if let Some(bonus) = inputs.loyalty_level.map(loyalty_bonus).filter(|bonus| *bonus > 0.0) {
        score += bonus;
        triggered = true;
    }

    if inputs.days_since_last_order.is_some_and(|days| days <= RECENT_ORDER_DAYS) {
        score += RECENT_ORDER_WEIGHT;
        triggered = true;
    }

    if !triggered {
        return DEFAULT_CONFIDENCE;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(
        total_orders: u32,
        segment: Option<Segment>,
        loyalty_level: Option<LoyaltyLevel>,
        days: Option<i64>,
    ) -> ConfidenceInputs {
        ConfidenceInputs { total_orders, segment, loyalty_level, days_since_last_order: days }
    }

    #[test]
    fn nothing_triggered_defaults_to_half() {
        assert_eq!(confidence_score(&inputs(0, None, None, None)), DEFAULT_CONFIDENCE);
        assert_eq!(confidence_score(&inputs(0, Some(Segment::Nuevo), None, None)), 0.5);
        assert_eq!(
            confidence_score(&inputs(0, Some(Segment::Nuevo), Some(LoyaltyLevel::Bronce), None)),
            0.5
        );
    }

    #[test]
    fn a_single_weak_factor_replaces_the_default() {
        let score = confidence_score(&inputs(1, Some(Segment::Nuevo), None, Some(45)));
        assert!((score - 0.03).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn all_factors_saturate_at_one() {
        let score = confidence_score(&inputs(
            25,
            Some(Segment::Vip),
            Some(LoyaltyLevel::Diamante),
            Some(2),
        ));
        assert!((score - 1.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn factors_are_weighted_independently() {
        let score = confidence_score(&inputs(
            5,
            Some(Segment::Frecuente),
            Some(LoyaltyLevel::Oro),
            Some(31),
        ));
        assert!((score - (0.15 + 0.25 + 0.15)).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let segments = [None, Some(Segment::Nuevo), Some(Segment::Vip), Some(Segment::Inactivo)];
        let levels = [None, Some(LoyaltyLevel::Bronce), Some(LoyaltyLevel::Platino)];
        for orders in [0, 1, 9, 10, 500] {
            for segment in segments {
                for level in levels {
                    for days in [None, Some(0), Some(30), Some(400)] {
                        let score = confidence_score(&inputs(orders, segment, level, days));
                        assert!((0.0..=1.0).contains(&score), "{score} out of range");
                    }
                }
            }
        }
    }
}
