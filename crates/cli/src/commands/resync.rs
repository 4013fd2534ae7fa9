use std::collections::BTreeSet;

use chrono::Utc;
use fitstore_core::config::LoadOptions;
use fitstore_core::domain::order::{OrderStatus, UserId};
use fitstore_core::stores::OrderStore;
use serde::Serialize;

use crate::commands::{run_with_database, CommandResult, Repositories};

#[derive(Debug, Serialize)]
struct ResyncOutput {
    provisioned_candidates: usize,
    processed: usize,
    updated: usize,
    failed: usize,
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let result = run_with_database("resync", options, |_config, pool| async move {
        let repositories = Repositories::new(&pool);
        let service = repositories.metrics_service();
        let now = Utc::now();

        let buyers = repositories
            .orders
            .find_orders_by_status(&OrderStatus::QUALIFYING)
            .await
            .map_err(|error| ("order_lookup", error.to_string(), 7u8))?
            .into_iter()
            .map(|order| order.user_id)
            .collect::<BTreeSet<UserId>>();

        for user_id in &buyers {
            service
                .ensure_customer(user_id, now)
                .await
                .map_err(|error| ("customer_provisioning", error.to_string(), 7u8))?;
        }

        let summary = service
            .resync_all(now)
            .await
            .map_err(|error| ("customer_resync", error.to_string(), 7u8))?;

        Ok(ResyncOutput {
            provisioned_candidates: buyers.len(),
            processed: summary.processed,
            updated: summary.updated,
            failed: summary.failed,
        })
    });

    match result {
        Ok(output) => {
            let message = format!(
                "recomputed {} customers ({} segment changes, {} failures)",
                output.processed, output.updated, output.failed
            );
            CommandResult::success_with_data("resync", message, serde_json::to_value(&output).ok())
        }
        Err(failure) => failure,
    }
}
