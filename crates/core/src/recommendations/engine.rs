//! Recommendation strategies

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RecommendationConfig;
use crate::domain::customer::{CustomerId, Segment};
use crate::domain::order::{Order, OrderStatus, UserId};
use crate::domain::product::{Product, ProductId};
use crate::errors::RecommendationError;
use crate::stores::{CustomerStore, OrderStore, ProductStore};

use super::catalog::preferred_categories;
use super::cooccurrence::{CoOccurrenceMatrix, MatrixCache};
use super::types::*;
use super::RecommendationResult;

#[derive(Debug, Default)]
struct PopularityTally {
    quantity: u64,
    orders: u64,
}

#[derive(Debug, Default)]
struct Candidate {
    score: u64,
    reasons: Vec<String>,
}

pub(super) fn ensure_limit(limit: usize) -> RecommendationResult<()> {
    if limit == 0 {
        return Err(RecommendationError::InvalidLimit);
    }
    Ok(())
}

/// Keeps the first entry per product id.
pub(super) fn dedupe(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut seen = HashSet::new();
    recommendations
        .into_iter()
        .filter(|recommendation| seen.insert(recommendation.product.id.clone()))
        .collect()
}

/// The main recommendation engine
pub struct RecommendationEngine {
    pub(super) orders: Arc<dyn OrderStore>,
    pub(super) products: Arc<dyn ProductStore>,
    pub(super) customers: Arc<dyn CustomerStore>,
    pub(super) config: RecommendationConfig,
    matrix_cache: Option<MatrixCache>,
}

impl RecommendationEngine {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        customers: Arc<dyn CustomerStore>,
        mut config: RecommendationConfig,
    ) -> Self {
        // Configured sizes feed limit-checked strategies directly, so none may be zero.
        config.default_limit = config.default_limit.max(1);
        config.similar_limit = config.similar_limit.max(1);
        config.trending_limit = config.trending_limit.max(1);
        let matrix_cache = config.cache_matrix.then(MatrixCache::new);
        Self { orders, products, customers, config, matrix_cache }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Co-occurrence matrix for the current qualifying order snapshot.
    pub async fn co_occurrence_matrix(&self) -> RecommendationResult<Arc<CoOccurrenceMatrix>> {
        let orders = self.orders.find_orders_by_status(&OrderStatus::QUALIFYING).await?;
        let matrix = match &self.matrix_cache {
            Some(cache) => cache.get_or_build(&orders),
            None => Arc::new(CoOccurrenceMatrix::build(&orders)),
        };

        debug!(
            event_name = "recommendations.matrix.ready",
            orders = orders.len(),
            products = matrix.product_count(),
            "co-occurrence matrix ready"
        );
        Ok(matrix)
    }

    /// Products most often bought together with `product_id`.
    pub async fn item_based(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        ensure_limit(limit)?;
        if self.products.find_by_id(product_id).await?.is_none() {
            return Err(RecommendationError::ProductNotFound(product_id.clone()));
        }

        let matrix = self.co_occurrence_matrix().await?;
        self.item_based_with(&matrix, product_id, limit).await
    }

    /// Takes the top `limit` partners, then drops any whose product record is gone.
    pub(super) async fn item_based_with(
        &self,
        matrix: &CoOccurrenceMatrix,
        product_id: &ProductId,
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        let ranked: Vec<(ProductId, u32)> = matrix
            .partners(product_id)
            .into_iter()
            .take(limit)
            .map(|(id, count)| (id.clone(), count))
            .collect();
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let catalog = self.load_products(&ids).await?;

        Ok(ranked
            .into_iter()
            .filter_map(|(id, count)| {
                catalog.get(&id).map(|product| {
                    Recommendation::new(product.clone(), f64::from(count), REASON_BOUGHT_TOGETHER)
                })
            })
            .collect())
    }

    /// Products ranked by units sold across qualifying orders.
    pub async fn popular(&self, limit: usize) -> RecommendationResult<Vec<Recommendation>> {
        ensure_limit(limit)?;
        let orders = self.orders.find_orders_by_status(&OrderStatus::QUALIFYING).await?;

        let mut tallies: HashMap<ProductId, PopularityTally> = HashMap::new();
        for order in orders.iter().filter(|order| order.status.qualifies()) {
            let mut counted = HashSet::new();
            for line in &order.lines {
                let tally = tallies.entry(line.product_id.clone()).or_default();
                tally.quantity += u64::from(line.quantity);
                if counted.insert(&line.product_id) {
                    tally.orders += 1;
                }
            }
        }

        let mut ranked: Vec<(ProductId, PopularityTally)> = tallies.into_iter().collect();
        ranked.sort_by(|a, b| b.1.quantity.cmp(&a.1.quantity).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        let ids: Vec<ProductId> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let catalog = self.load_products(&ids).await?;

        Ok(ranked
            .into_iter()
            .filter_map(|(id, tally)| {
                let product = catalog.get(&id)?;
                let mut recommendation =
                    Recommendation::new(product.clone(), tally.quantity as f64, REASON_POPULAR);
                recommendation.total_quantity = Some(tally.quantity);
                recommendation.total_orders = Some(tally.orders);
                Some(recommendation)
            })
            .collect())
    }

    /// In-stock products of a category, newest first.
    pub async fn by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        ensure_limit(limit)?;
        let mut products = self.products.find_by_category(category, true).await?;
        products.retain(|product| product.is_in_stock() && product.in_category(category));
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        products.truncate(limit);

        let reason = category_reason(category);
        Ok(products
            .into_iter()
            .map(|product| Recommendation::new(product, 1.0, reason.clone()))
            .collect())
    }

    /// Category picks for the customer's segment. Unknown customers get the popularity ranking.
    pub async fn segment_based(
        &self,
        customer_id: &CustomerId,
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        ensure_limit(limit)?;
        let segment = self.customers.find_by_id(customer_id).await?.map(|customer| customer.segment);
        self.segment_based_for(segment, limit).await
    }

    pub(super) async fn segment_based_for(
        &self,
        segment: Option<Segment>,
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        let Some(segment) = segment else {
            return self.popular_fallback("segment_unknown", limit, None).await;
        };

        let categories = preferred_categories(segment);
        let mut merged: Vec<Recommendation> = Vec::new();
        let mut seen: HashSet<ProductId> = HashSet::new();
        let reason = segment_reason(segment);

        for category in categories {
            if merged.len() >= limit {
                break;
            }
            for mut recommendation in self.by_category(category, limit).await? {
                if merged.len() >= limit {
                    break;
                }
                if seen.insert(recommendation.product.id.clone()) {
                    recommendation.reason = reason.clone();
                    merged.push(recommendation);
                }
            }
        }

        if merged.is_empty() {
            return self.popular_fallback("segment_categories_empty", limit, None).await;
        }
        Ok(merged)
    }

    /// Collaborative filtering over everything the user already bought.
    pub async fn user_based(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        ensure_limit(limit)?;
        let orders: Vec<Order> = self
            .orders
            .find_orders_by_user(user_id, &OrderStatus::QUALIFYING)
            .await?
            .into_iter()
            .filter(|order| order.status.qualifies())
            .collect();
        if orders.is_empty() {
            debug!(
                event_name = "recommendations.user_based.no_history",
                user_id = %user_id,
                "user has no qualifying orders, delegating to popularity"
            );
            return self.popular(limit).await;
        }

        let matrix = self.co_occurrence_matrix().await?;
        self.rank_by_history(&matrix, &orders, limit).await
    }

    /// Accumulates partner counts across every product in `orders`, skipping owned products.
    pub(super) async fn rank_by_history(
        &self,
        matrix: &CoOccurrenceMatrix,
        orders: &[Order],
        limit: usize,
    ) -> RecommendationResult<Vec<Recommendation>> {
        let mut purchased: Vec<ProductId> = Vec::new();
        let mut purchased_set: HashSet<ProductId> = HashSet::new();
        for order in orders {
            for id in order.distinct_product_ids() {
                if purchased_set.insert(id.clone()) {
                    purchased.push(id.clone());
                }
            }
        }

        let mut candidates: HashMap<ProductId, Candidate> = HashMap::new();
        let mut contributions: Vec<(ProductId, ProductId, u32)> = Vec::new();
        for seed in &purchased {
            for (partner, count) in matrix.partners(seed).into_iter().take(limit) {
                if purchased_set.contains(partner) {
                    continue;
                }
                contributions.push((partner.clone(), seed.clone(), count));
            }
        }

        let mut lookup: Vec<ProductId> =
            contributions.iter().map(|(partner, _, _)| partner.clone()).collect();
        lookup.extend(purchased.iter().cloned());
        let catalog = self.load_products(&lookup).await?;

        for (partner, seed, count) in contributions {
            // Partners whose product was deleted are dropped, same as the item-based strategy.
            if !catalog.contains_key(&partner) {
                continue;
            }
            let seed_name = catalog
                .get(&seed)
                .map(|product| product.name.clone())
                .unwrap_or_else(|| seed.0.clone());
            let candidate = candidates.entry(partner).or_default();
            candidate.score += u64::from(count);
            candidate.reasons.push(format!("{REASON_BOUGHT_TOGETHER} with {seed_name}"));
        }

        if candidates.is_empty() {
            return self
                .popular_fallback("no_related_products", limit, Some(REASON_FALLBACK_NO_RELATED))
                .await;
        }

        let mut ranked: Vec<(ProductId, Candidate)> = candidates.into_iter().collect();
        ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        Ok(ranked
            .into_iter()
            .filter_map(|(id, candidate)| {
                let product = catalog.get(&id)?;
                let mut recommendation = Recommendation::new(
                    product.clone(),
                    candidate.score as f64,
                    REASON_BOUGHT_TOGETHER,
                );
                recommendation.contributing_reasons = candidate.reasons;
                Some(recommendation)
            })
            .collect())
    }

    pub(super) async fn popular_fallback(
        &self,
        cause: &'static str,
        limit: usize,
        reason: Option<&str>,
    ) -> RecommendationResult<Vec<Recommendation>> {
        info!(
            event_name = "recommendations.fallback.popular",
            cause,
            limit,
            "strategy produced no results, falling back to popular products"
        );
        let mut popular = self.popular(limit).await?;
        if let Some(reason) = reason {
            for recommendation in &mut popular {
                recommendation.reason = reason.to_string();
            }
        }
        Ok(popular)
    }

    pub(super) async fn load_products(
        &self,
        ids: &[ProductId],
    ) -> RecommendationResult<HashMap<ProductId, Product>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut unique: Vec<ProductId> = Vec::with_capacity(ids.len());
        let mut seen = HashSet::new();
        for id in ids {
            if seen.insert(id) {
                unique.push(id.clone());
            }
        }

        let products = self.products.find_by_ids(&unique).await?;
        Ok(products.into_iter().map(|product| (product.id.clone(), product)).collect())
    }
}
