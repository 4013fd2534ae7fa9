use chrono::Utc;
use fitstore_core::config::LoadOptions;
use fitstore_core::domain::order::UserId;
use fitstore_core::segmentation::ResyncSummary;
use fitstore_db::{DemoDataset, SeedResult, SEED_USER_IDS};
use serde::Serialize;

use crate::commands::{run_with_database, CommandResult, Failure, Repositories};

#[derive(Debug, Serialize)]
struct SeedOutput {
    seeded: SeedResult,
    customers: ResyncSummary,
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let result = run_with_database("seed", options, |_config, pool| async move {
        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            return Err(verification_failure(&verification.checks));
        }

        let service = Repositories::new(&pool).metrics_service();
        let now = Utc::now();
        for user in SEED_USER_IDS {
            service
                .ensure_customer(&UserId::new(*user), now)
                .await
                .map_err(|error| ("customer_provisioning", error.to_string(), 7u8))?;
        }
        let customers = service
            .resync_all(now)
            .await
            .map_err(|error| ("customer_resync", error.to_string(), 7u8))?;

        Ok(SeedOutput { seeded, customers })
    });

    match result {
        Ok(output) => {
            let message = format!(
                "demo dataset loaded: {} products, {} orders, {} customers classified",
                output.seeded.products, output.seeded.orders, output.customers.processed
            );
            CommandResult::success_with_data("seed", message, serde_json::to_value(&output).ok())
        }
        Err(failure) => failure,
    }
}

fn verification_failure(checks: &[(&'static str, bool)]) -> Failure {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    let message = if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    };
    ("seed_verification", message, 6)
}

#[cfg(test)]
mod tests {
    use super::verification_failure;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [
            ("products", true),
            ("product-categories", false),
            ("ord-1005", false),
        ];

        let (class, message, exit_code) = verification_failure(&checks);

        assert_eq!(class, "seed_verification");
        assert_eq!(exit_code, 6);
        assert_eq!(
            message,
            "Seed verification failed for checks: product-categories, ord-1005"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("products", true), ("order-lines", true)];

        let (_, message, _) = verification_failure(&checks);

        assert_eq!(message, "Some seed data failed to load");
    }
}
