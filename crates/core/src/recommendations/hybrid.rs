//! Hybrid profile recommendations

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use tracing::info;

use crate::domain::customer::{Customer, CustomerId, Segment};
use crate::domain::order::{Order, OrderStatus};
use crate::errors::RecommendationError;

use super::catalog::complementary_categories;
use super::confidence::{confidence_score, ConfidenceInputs};
use super::cooccurrence::CoOccurrenceMatrix;
use super::engine::{dedupe, ensure_limit, RecommendationEngine};
use super::types::*;
use super::{
    RecommendationResult, CROSS_SELL_PER_CATEGORY, MAX_COMPLEMENTARY_CATEGORIES, UPSELL_LIMIT,
};

impl RecommendationEngine {
    pub async fn hybrid(
        &self,
        customer_id: &CustomerId,
        options: HybridOptions,
    ) -> RecommendationResult<HybridRecommendations> {
        self.hybrid_at(customer_id, options, Utc::now()).await
    }

    /// Same as [`RecommendationEngine::hybrid`] with an explicit clock for recency checks.
    pub async fn hybrid_at(
        &self,
        customer_id: &CustomerId,
        options: HybridOptions,
        now: DateTime<Utc>,
    ) -> RecommendationResult<HybridRecommendations> {
        let limit = options.limit.unwrap_or(self.config.default_limit);
        ensure_limit(limit)?;

        let customer = self
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| RecommendationError::CustomerNotFound(customer_id.clone()))?;

        let history: Vec<Order> = self
            .orders
            .find_orders_by_user(&customer.user_id, &OrderStatus::QUALIFYING)
            .await?
            .into_iter()
            .filter(|order| order.status.qualifies())
            .collect();
        let matrix = self.co_occurrence_matrix().await?;

        let featured = dedupe(self.featured(&matrix, &history, limit).await?);
        let cross_sell = dedupe(self.cross_sell(&customer).await?);
        let upsell = dedupe(self.upsell(customer.segment).await?);
        let similar = dedupe(self.similar(&matrix, &history).await?);
        let trending = dedupe(
            self.segment_based_for(Some(customer.segment), self.config.trending_limit).await?,
        );

        let confidence = confidence_score(&ConfidenceInputs::for_customer(&customer, now));
        let total_recommendations =
            featured.len() + cross_sell.len() + upsell.len() + similar.len() + trending.len();

        info!(
            event_name = "recommendations.hybrid.generated",
            customer_id = %customer.id,
            segment = customer.segment.as_str(),
            featured = featured.len(),
            cross_sell = cross_sell.len(),
            upsell = upsell.len(),
            similar = similar.len(),
            trending = trending.len(),
            confidence,
            "hybrid recommendations generated"
        );

        Ok(HybridRecommendations {
            customer_id: customer.id,
            segment: customer.segment,
            featured,
            cross_sell,
            upsell,
            similar,
            trending,
            confidence_score: confidence,
            total_recommendations,
            generated_at: now,
        })
    }

    async fn featured(
        &self,
        matrix: &CoOccurrenceMatrix,
        history: &[Order],
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        let featured_limit = (limit / 2).max(1);
        if history.is_empty() {
            return self
                .popular_fallback(
                    "no_purchase_history",
                    featured_limit,
                    Some(REASON_FALLBACK_NEW_USER),
                )
                .await;
        }

        let featured = self.rank_by_history(matrix, history, featured_limit).await?;
        if featured.is_empty() {
            return self.popular(featured_limit).await;
        }
        Ok(featured)
    }

    async fn cross_sell(&self, customer: &Customer) -> RecommendationResult<Vec<Recommendation>> {
        let Some(top_category) = customer.preferences.top_category() else {
            return Ok(Vec::new());
        };

        let mut picks = Vec::new();
        let complements = complementary_categories(top_category);
        for category in complements.iter().take(MAX_COMPLEMENTARY_CATEGORIES) {
            picks.extend(self.by_category(category, CROSS_SELL_PER_CATEGORY).await?);
        }
        Ok(picks)
    }

    async fn upsell(&self, segment: Segment) -> RecommendationResult<Vec<Recommendation>> {
        if !matches!(segment, Segment::Vip | Segment::Frecuente) {
            return Ok(Vec::new());
        }

        let floor = self.config.premium_price_floor;
        let mut premium = self.products.find_premium(floor, true).await?;
        premium.retain(|product| product.is_in_stock() && product.price >= floor);
        premium.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.id.cmp(&b.id)));
        premium.truncate(UPSELL_LIMIT);

        Ok(premium
            .into_iter()
            .map(|product| {
                let score = product.price.to_f64().unwrap_or_default();
                Recommendation::new(product, score, REASON_PREMIUM)
            })
            .collect())
    }

    /// Item-based picks seeded by the first line of the latest delivered order.
    async fn similar(
        &self,
        matrix: &CoOccurrenceMatrix,
        history: &[Order],
    ) -> RecommendationResult<Vec<Recommendation>> {
        let latest_delivered = history
            .iter()
            .filter(|order| order.status == OrderStatus::Delivered)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| b.id.0.cmp(&a.id.0)));

        match latest_delivered.and_then(Order::first_product_id) {
            Some(seed) => self.item_based_with(matrix, seed, self.config.similar_limit).await,
            None => Ok(Vec::new()),
        }
    }
}
