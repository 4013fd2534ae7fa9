//! Output types for the recommendation engine

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::customer::{CustomerId, Segment};
use crate::domain::product::Product;

pub const REASON_BOUGHT_TOGETHER: &str = "frequently bought together";
pub const REASON_POPULAR: &str = "popular product";
pub const REASON_FALLBACK_NEW_USER: &str = "popular product (fallback: no personal history)";
pub const REASON_FALLBACK_NO_RELATED: &str = "popular product (fallback: no related products)";
pub const REASON_PREMIUM: &str = "premium pick for your profile";

pub fn category_reason(category: &str) -> String {
    format!("popular in {category}")
}

pub fn segment_reason(segment: Segment) -> String {
    format!("recommended for {segment} customers")
}

/// A ranked product entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(flatten)]
    pub product: Product,
    pub score: f64,
    pub reason: String,
    /// Units sold, set by the popularity strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_quantity: Option<u64>,
    /// Orders containing the product, set by the popularity strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_orders: Option<u64>,
    /// Per-seed explanations accumulated by the user-based strategy
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributing_reasons: Vec<String>,
}

impl Recommendation {
    pub fn new(product: Product, score: f64, reason: impl Into<String>) -> Self {
        Self {
            product,
            score,
            reason: reason.into(),
            total_quantity: None,
            total_orders: None,
            contributing_reasons: Vec::new(),
        }
    }

    pub fn product_id(&self) -> &str {
        self.product.id.as_str()
    }
}

/// Options for the hybrid profile call
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridOptions {
    /// Overall size hint; `None` uses the configured default
    pub limit: Option<usize>,
}

impl HybridOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }
}

/// Labeled buckets produced by the hybrid recommender.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridRecommendations {
    pub customer_id: CustomerId,
    pub segment: Segment,
    pub featured: Vec<Recommendation>,
    pub cross_sell: Vec<Recommendation>,
    pub upsell: Vec<Recommendation>,
    pub similar: Vec<Recommendation>,
    pub trending: Vec<Recommendation>,
    pub confidence_score: f64,
    pub total_recommendations: usize,
    pub generated_at: DateTime<Utc>,
}

impl HybridRecommendations {
    pub fn buckets(&self) -> [(&'static str, &[Recommendation]); 5] {
        [
            ("featured", &self.featured),
            ("crossSell", &self.cross_sell),
            ("upsell", &self.upsell),
            ("similar", &self.similar),
            ("trending", &self.trending),
        ]
    }
}
