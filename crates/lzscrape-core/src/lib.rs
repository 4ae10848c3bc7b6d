pub mod app_config;
pub mod categories;
pub mod config;
pub mod countries;
pub mod credentials;
pub mod error;
pub mod products;
pub mod run;

pub use app_config::{AppConfig, Environment};
pub use categories::{load_categories, CategoryConfig, CategoryList};
pub use config::{load_app_config, load_app_config_from_env};
pub use countries::{
    load_countries, CaptureRequirements, CountryConfig, CountryList, FieldMapping, FieldPaths,
};
pub use credentials::{load_credentials, WarehouseCredentials};
pub use error::ConfigError;
pub use products::ProductRecord;
pub use run::{
    CategoryOutcome, CategoryStatus, CountryOutcome, CountryStatus, RunSummary, ScrapeRun,
};
