pub mod capture;
pub mod client;
pub mod error;
pub mod normalize;
pub mod pagination;
pub mod rate_limit;

pub use capture::CapturedRequest;
pub use client::{jittered, CatalogClient, CategoryPages, FetchLimits};
pub use error::ScraperError;
pub use normalize::normalize_page;
pub use rate_limit::RetryPolicy;
