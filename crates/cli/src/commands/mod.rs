pub mod config;
pub mod migrate;
pub mod recommend;
pub mod resync;
pub mod seed;

use std::sync::Arc;

use fitstore_core::config::{AppConfig, LoadOptions};
use fitstore_core::segmentation::CustomerMetricsService;
use fitstore_db::{
    connect_with_config, migrations, DbPool, SqlCustomerRepository, SqlOrderRepository,
    SqlProductRepository,
};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// `(error_class, message, exit_code)` carried out of a command's async block.
pub(crate) type Failure = (&'static str, String, u8);

pub(crate) fn load_config(options: &LoadOptions) -> Result<AppConfig, Failure> {
    AppConfig::load(options.clone())
        .map_err(|error| ("config_validation", format!("configuration issue: {error}"), 2))
}

pub(crate) fn build_runtime() -> Result<Runtime, Failure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        ("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
    })
}

/// Connects and applies pending migrations, so every command works against a fresh database.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5))?;
    Ok(pool)
}

pub(crate) struct Repositories {
    pub orders: Arc<SqlOrderRepository>,
    pub products: Arc<SqlProductRepository>,
    pub customers: Arc<SqlCustomerRepository>,
}

impl Repositories {
    pub fn new(pool: &DbPool) -> Self {
        Self {
            orders: Arc::new(SqlOrderRepository::new(pool.clone())),
            products: Arc::new(SqlProductRepository::new(pool.clone())),
            customers: Arc::new(SqlCustomerRepository::new(pool.clone())),
        }
    }

    pub fn metrics_service(&self) -> CustomerMetricsService {
        CustomerMetricsService::new(
            self.orders.clone(),
            self.products.clone(),
            self.customers.clone(),
        )
    }
}

/// Loads config, starts a runtime, and runs `body` against a migrated pool. The pool is closed
/// whether or not `body` succeeds.
pub(crate) fn run_with_database<T, F, Fut>(
    command: &str,
    options: &LoadOptions,
    body: F,
) -> Result<T, CommandResult>
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: std::future::Future<Output = Result<T, Failure>>,
{
    let config =
        load_config(options).map_err(|failure| CommandResult::from_failure(command, failure))?;
    let runtime =
        build_runtime().map_err(|failure| CommandResult::from_failure(command, failure))?;

    runtime
        .block_on(async {
            let pool = open_database(&config).await?;
            let result = body(config, pool.clone()).await;
            pool.close().await;
            result
        })
        .map_err(|failure| CommandResult::from_failure(command, failure))
}
