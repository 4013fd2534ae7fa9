use clap::Subcommand;
use fitstore_core::config::LoadOptions;
use fitstore_core::domain::customer::CustomerId;
use fitstore_core::domain::order::UserId;
use fitstore_core::domain::product::ProductId;
use fitstore_core::errors::{ApplicationError, InterfaceError, RecommendationError};
use fitstore_core::recommendations::{HybridOptions, RecommendationEngine};
use fitstore_core::stores::CustomerStore;
use serde_json::Value;

use crate::commands::{run_with_database, CommandResult, Failure, Repositories};

#[derive(Debug, Subcommand)]
pub enum RecommendTarget {
    #[command(about = "Products most often bought together with a product")]
    Item {
        product_id: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Best sellers across every non-cancelled order, pending included")]
    Popular {
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Newest in-stock products tagged with a category")]
    Category {
        category: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Picks for the customer's segment")]
    Segment {
        customer: String,
        #[arg(long, help = "Treat the argument as a user id instead of a customer id")]
        by_user: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Products bought alongside the user's purchase history")]
    User {
        user_id: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Labeled featured, cross-sell, upsell, similar and trending buckets")]
    Hybrid {
        customer: String,
        #[arg(long, help = "Treat the argument as a user id instead of a customer id")]
        by_user: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl RecommendTarget {
    fn strategy(&self) -> &'static str {
        match self {
            Self::Item { .. } => "item",
            Self::Popular { .. } => "popular",
            Self::Category { .. } => "category",
            Self::Segment { .. } => "segment",
            Self::User { .. } => "user",
            Self::Hybrid { .. } => "hybrid",
        }
    }
}

pub fn run(options: &LoadOptions, target: RecommendTarget) -> CommandResult {
    let strategy = target.strategy();
    let result = run_with_database("recommend", options, |config, pool| async move {
        let repositories = Repositories::new(&pool);
        let engine = RecommendationEngine::new(
            repositories.orders.clone(),
            repositories.products.clone(),
            repositories.customers.clone(),
            config.recommendations.clone(),
        );
        let default_limit = config.recommendations.default_limit;

        match target {
            RecommendTarget::Item { product_id, limit } => {
                let found = engine
                    .item_based(&ProductId::new(product_id), limit.unwrap_or(default_limit))
                    .await
                    .map_err(recommendation_failure)?;
                Ok(list_payload(found.len(), serde_json::to_value(&found)))
            }
            RecommendTarget::Popular { limit } => {
                let found = engine
                    .popular(limit.unwrap_or(default_limit))
                    .await
                    .map_err(recommendation_failure)?;
                Ok(list_payload(found.len(), serde_json::to_value(&found)))
            }
            RecommendTarget::Category { category, limit } => {
                let found = engine
                    .by_category(&category, limit.unwrap_or(default_limit))
                    .await
                    .map_err(recommendation_failure)?;
                Ok(list_payload(found.len(), serde_json::to_value(&found)))
            }
            RecommendTarget::Segment { customer, by_user, limit } => {
                let customer_id = resolve_customer(&repositories, customer, by_user).await?;
                let found = engine
                    .segment_based(&customer_id, limit.unwrap_or(default_limit))
                    .await
                    .map_err(recommendation_failure)?;
                Ok(list_payload(found.len(), serde_json::to_value(&found)))
            }
            RecommendTarget::User { user_id, limit } => {
                let found = engine
                    .user_based(&UserId::new(user_id), limit.unwrap_or(default_limit))
                    .await
                    .map_err(recommendation_failure)?;
                Ok(list_payload(found.len(), serde_json::to_value(&found)))
            }
            RecommendTarget::Hybrid { customer, by_user, limit } => {
                let customer_id = resolve_customer(&repositories, customer, by_user).await?;
                let options = HybridOptions { limit };
                let profile =
                    engine.hybrid(&customer_id, options).await.map_err(recommendation_failure)?;
                Ok(list_payload(profile.total_recommendations, serde_json::to_value(&profile)))
            }
        }
    });

    match result {
        Ok((count, data)) => CommandResult::success_with_data(
            "recommend",
            format!("{count} {strategy} recommendations"),
            Some(data),
        ),
        Err(failure) => failure,
    }
}

fn list_payload(count: usize, data: Result<Value, serde_json::Error>) -> (usize, Value) {
    (count, data.unwrap_or_else(|error| Value::String(format!("unserializable payload: {error}"))))
}

/// A customer id passes through untouched; with `by_user` the user's customer record is looked up
/// first, and a user without one is reported as not found.
async fn resolve_customer(
    repositories: &Repositories,
    raw: String,
    by_user: bool,
) -> Result<CustomerId, Failure> {
    if !by_user {
        return Ok(CustomerId::new(raw));
    }

    let customer =
        repositories.customers.find_by_user(&UserId::new(raw.clone())).await.map_err(|error| {
            interface_failure(ApplicationError::Persistence(error.detail().to_owned()))
        })?;
    customer.map(|customer| customer.id).ok_or_else(|| {
        interface_failure(ApplicationError::NotFound(format!("customer for user {raw}")))
    })
}

fn recommendation_failure(error: RecommendationError) -> Failure {
    interface_failure(ApplicationError::from(error))
}

fn interface_failure(error: ApplicationError) -> Failure {
    let interface = InterfaceError::from(error);
    let exit_code = match interface {
        InterfaceError::BadRequest { .. } => 8,
        InterfaceError::NotFound { .. } => 9,
        InterfaceError::ServiceUnavailable { .. } => 10,
        InterfaceError::Internal { .. } => 11,
    };
    (interface.error_class(), interface.to_string(), exit_code)
}
