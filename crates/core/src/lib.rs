pub mod config;
pub mod domain;
pub mod errors;
pub mod recommendations;
pub mod segmentation;
pub mod stores;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::customer::{
    ChurnRisk, Customer, CustomerId, CustomerInteraction, CustomerMetrics, CustomerPreferences,
    InteractionKind, LoyaltyLevel, Segment,
};
pub use domain::order::{Order, OrderId, OrderLine, OrderStatus, UserId};
pub use domain::product::{Product, ProductId};
pub use errors::{
    ApplicationError, DomainError, InterfaceError, MetricsError, RecommendationError, StoreError,
};
pub use recommendations::{
    HybridOptions, HybridRecommendations, Recommendation, RecommendationEngine,
};
pub use segmentation::{CustomerMetricsService, ResyncSummary};
pub use stores::{CustomerStore, OrderStore, ProductStore};
