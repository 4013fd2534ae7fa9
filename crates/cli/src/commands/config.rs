use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fitstore_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
    overridden: bool,
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let fields = [
        Field {
            key_path: "database.url",
            env_keys: &["FITSTORE_DATABASE_URL"],
            value: config.database.url.clone(),
            overridden: overrides.database_url.is_some(),
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["FITSTORE_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
            overridden: false,
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["FITSTORE_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
            overridden: false,
        },
        Field {
            key_path: "recommendations.default_limit",
            env_keys: &["FITSTORE_RECOMMENDATIONS_DEFAULT_LIMIT"],
            value: config.recommendations.default_limit.to_string(),
            overridden: overrides.default_limit.is_some(),
        },
        Field {
            key_path: "recommendations.premium_price_floor",
            env_keys: &["FITSTORE_RECOMMENDATIONS_PREMIUM_PRICE_FLOOR"],
            value: config.recommendations.premium_price_floor.to_string(),
            overridden: false,
        },
        Field {
            key_path: "recommendations.similar_limit",
            env_keys: &["FITSTORE_RECOMMENDATIONS_SIMILAR_LIMIT"],
            value: config.recommendations.similar_limit.to_string(),
            overridden: false,
        },
        Field {
            key_path: "recommendations.trending_limit",
            env_keys: &["FITSTORE_RECOMMENDATIONS_TRENDING_LIMIT"],
            value: config.recommendations.trending_limit.to_string(),
            overridden: false,
        },
        Field {
            key_path: "recommendations.cache_matrix",
            env_keys: &["FITSTORE_RECOMMENDATIONS_CACHE_MATRIX"],
            value: config.recommendations.cache_matrix.to_string(),
            overridden: overrides.cache_matrix.is_some(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["FITSTORE_LOGGING_LEVEL", "FITSTORE_LOG_LEVEL"],
            value: config.logging.level.clone(),
            overridden: overrides.log_level.is_some(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["FITSTORE_LOGGING_FORMAT", "FITSTORE_LOG_FORMAT"],
            value: config.logging.format.as_str().to_string(),
            overridden: overrides.log_format.is_some(),
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    lines.extend(fields.iter().map(|field| {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        render_line(field.key_path, &field.value, source)
    }));

    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("fitstore.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/fitstore.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "flag".to_string();
    }

    let env_key = field
        .env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
