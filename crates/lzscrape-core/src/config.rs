use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so an empty environment yields a usable
/// config; only malformed values are rejected.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("LZS_ENV", "development"))?;
    let log_level = or_default("LZS_LOG_LEVEL", "info");

    let key_path = PathBuf::from(or_default("LZS_KEY_PATH", "./key.json"));
    let countries_path = PathBuf::from(or_default("LZS_COUNTRIES_PATH", "./config/countries.yaml"));
    let categories_path = PathBuf::from(or_default(
        "LZS_CATEGORIES_PATH",
        "./config/categories.yaml",
    ));
    let capture_dir = PathBuf::from(or_default("LZS_CAPTURE_DIR", "."));
    let backup_dir = PathBuf::from(or_default("LZS_BACKUP_DIR", "./data"));

    let request_timeout_secs = parse_u64("LZS_REQUEST_TIMEOUT_SECS", "45")?;
    let max_pages = parse_u32("LZS_MAX_PAGES", "2")?;
    let target_products_per_category = parse_usize("LZS_TARGET_PRODUCTS_PER_CATEGORY", "50")?;
    let min_products_per_category = parse_usize("LZS_MIN_PRODUCTS_PER_CATEGORY", "30")?;
    let page_delay_ms = parse_u64("LZS_PAGE_DELAY_MS", "2000")?;
    let category_delay_ms = parse_u64("LZS_CATEGORY_DELAY_MS", "5000")?;
    let network_max_retries = parse_u32("LZS_NETWORK_MAX_RETRIES", "2")?;
    let rate_limit_backoff_secs = parse_u64("LZS_RATE_LIMIT_BACKOFF_SECS", "10")?;

    let db_max_connections = parse_u32("LZS_DB_MAX_CONNECTIONS", "5")?;
    let db_acquire_timeout_secs = parse_u64("LZS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if max_pages == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "LZS_MAX_PAGES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if db_max_connections == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "LZS_DB_MAX_CONNECTIONS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        log_level,
        key_path,
        countries_path,
        categories_path,
        capture_dir,
        backup_dir,
        request_timeout_secs,
        max_pages,
        target_products_per_category,
        min_products_per_category,
        page_delay_ms,
        category_delay_ms,
        network_max_retries,
        rate_limit_backoff_secs,
        db_max_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LZS_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
