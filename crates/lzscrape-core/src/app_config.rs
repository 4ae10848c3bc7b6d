use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide settings, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Service-account style key file holding the warehouse connection.
    pub key_path: PathBuf,
    pub countries_path: PathBuf,
    pub categories_path: PathBuf,
    /// Directory the per-country curl capture files are resolved against.
    pub capture_dir: PathBuf,
    /// Root of the flat-file backups (`{backup_dir}/{country}/{date}/`).
    pub backup_dir: PathBuf,
    pub request_timeout_secs: u64,
    /// Page cap per category.
    pub max_pages: u32,
    /// Stop paginating a category once this many items were collected.
    pub target_products_per_category: usize,
    /// Categories below this count are flagged by `verify`.
    pub min_products_per_category: usize,
    pub page_delay_ms: u64,
    pub category_delay_ms: u64,
    /// Immediate re-attempts after a transport failure.
    pub network_max_retries: u32,
    /// Pause before the single re-attempt after a 429.
    pub rate_limit_backoff_secs: u64,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}
