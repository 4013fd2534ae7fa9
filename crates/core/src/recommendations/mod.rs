//! Recommendation engine
//!
//! Collaborative filtering over a purchase co-occurrence graph, popularity and category
//! strategies, segment-driven suggestions, and a hybrid profile orchestrator that merges them into
//! labeled buckets with a confidence score. Any strategy that comes back empty degrades to the
//! popularity ranking.

mod catalog;
mod confidence;
mod cooccurrence;
mod engine;
mod hybrid;
mod types;

pub use catalog::{complementary_categories, preferred_categories};
pub use confidence::{confidence_score, ConfidenceInputs, DEFAULT_CONFIDENCE};
pub use cooccurrence::{snapshot_key, CoOccurrenceMatrix, MatrixCache};
pub use engine::RecommendationEngine;
pub use types::*;

use crate::errors::RecommendationError;

/// Result type for recommendation operations
pub type RecommendationResult<T> = Result<T, RecommendationError>;

/// Products pulled per complementary category for the cross-sell bucket.
pub const CROSS_SELL_PER_CATEGORY: usize = 2;

/// Complementary categories considered for the cross-sell bucket.
pub const MAX_COMPLEMENTARY_CATEGORIES: usize = 2;

/// Size of the upsell bucket.
pub const UPSELL_LIMIT: usize = 3;

#[cfg(test)]
pub(crate) mod fixtures;
