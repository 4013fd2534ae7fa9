use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub recommendations: RecommendationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommendationConfig {
    /// Limit used when a caller does not pass one.
    pub default_limit: usize,
    /// Minimum price for upsell candidates.
    pub premium_price_floor: Decimal,
    pub similar_limit: usize,
    pub trending_limit: usize,
    /// Reuse the co-occurrence matrix while the qualifying order snapshot is unchanged.
    pub cache_matrix: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub default_limit: Option<usize>,
    pub cache_matrix: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            premium_price_floor: Decimal::from(150_000),
            similar_limit: 4,
            trending_limit: 3,
            cache_matrix: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://fitstore.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            recommendations: RecommendationConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fitstore.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            if let Some(default_limit) = recommendations.default_limit {
                self.recommendations.default_limit = default_limit;
            }
            if let Some(premium_price_floor) = recommendations.premium_price_floor {
                self.recommendations.premium_price_floor = premium_price_floor;
            }
            if let Some(similar_limit) = recommendations.similar_limit {
                self.recommendations.similar_limit = similar_limit;
            }
            if let Some(trending_limit) = recommendations.trending_limit {
                self.recommendations.trending_limit = trending_limit;
            }
            if let Some(cache_matrix) = recommendations.cache_matrix {
                self.recommendations.cache_matrix = cache_matrix;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FITSTORE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FITSTORE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("FITSTORE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FITSTORE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("FITSTORE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FITSTORE_RECOMMENDATIONS_DEFAULT_LIMIT") {
            self.recommendations.default_limit =
                parse_env("FITSTORE_RECOMMENDATIONS_DEFAULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("FITSTORE_RECOMMENDATIONS_PREMIUM_PRICE_FLOOR") {
            self.recommendations.premium_price_floor =
                parse_env("FITSTORE_RECOMMENDATIONS_PREMIUM_PRICE_FLOOR", &value)?;
        }
        if let Some(value) = read_env("FITSTORE_RECOMMENDATIONS_SIMILAR_LIMIT") {
            self.recommendations.similar_limit =
                parse_env("FITSTORE_RECOMMENDATIONS_SIMILAR_LIMIT", &value)?;
        }
        if let Some(value) = read_env("FITSTORE_RECOMMENDATIONS_TRENDING_LIMIT") {
            self.recommendations.trending_limit =
                parse_env("FITSTORE_RECOMMENDATIONS_TRENDING_LIMIT", &value)?;
        }
        if let Some(value) = read_env("FITSTORE_RECOMMENDATIONS_CACHE_MATRIX") {
            self.recommendations.cache_matrix =
                parse_env("FITSTORE_RECOMMENDATIONS_CACHE_MATRIX", &value)?;
        }

        let log_level =
            read_env("FITSTORE_LOGGING_LEVEL").or_else(|| read_env("FITSTORE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FITSTORE_LOGGING_FORMAT").or_else(|| read_env("FITSTORE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(default_limit) = overrides.default_limit {
            self.recommendations.default_limit = default_limit;
        }
        if let Some(cache_matrix) = overrides.cache_matrix {
            self.recommendations.cache_matrix = cache_matrix;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_recommendations(&self.recommendations)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fitstore.toml"), PathBuf::from("config/fitstore.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendations(recommendations: &RecommendationConfig) -> Result<(), ConfigError> {
    if recommendations.default_limit == 0 || recommendations.default_limit > 100 {
        return Err(ConfigError::Validation(
            "recommendations.default_limit must be in range 1..=100".to_string(),
        ));
    }

    if recommendations.similar_limit == 0 || recommendations.trending_limit == 0 {
        return Err(ConfigError::Validation(
            "recommendations.similar_limit and recommendations.trending_limit must be greater than zero"
                .to_string(),
        ));
    }

    if recommendations.premium_price_floor.is_sign_negative() {
        return Err(ConfigError::Validation(
            "recommendations.premium_price_floor must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    recommendations: Option<RecommendationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationsPatch {
    default_limit: Option<usize>,
    premium_price_floor: Option<Decimal>,
    similar_limit: Option<usize>,
    trending_limit: Option<usize>,
    cache_matrix: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
