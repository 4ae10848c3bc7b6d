//! Multi-page category fetch loop for `CatalogClient`.

use std::time::Duration;

use lzscrape_core::CountryConfig;
use serde_json::Value;

use crate::capture::CapturedRequest;
use crate::error::ScraperError;

use super::CatalogClient;

#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Hard cap on pages requested per category.
    pub max_pages: u32,
    /// Stop once this many listing items have been seen.
    pub target_items: usize,
    /// Base delay between pages; jittered by ±25 %.
    pub page_delay_ms: u64,
}

/// Raw listing pages for one category, in page order.
#[derive(Debug, Default)]
pub struct CategoryPages {
    pub pages: Vec<Value>,
    /// Listing items across all pages, before normalization.
    pub item_count: usize,
}

impl CatalogClient {
    /// Fetches listing pages for `query` until the site returns no items,
    /// `limits.target_items` is reached, or `limits.max_pages` pages are read.
    ///
    /// **All-or-nothing**: a failure on any page discards earlier pages and
    /// returns the error, so a category is never persisted half-fetched.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::SchemaMismatch`] if the first page has no
    /// listing array at the mapped path. Propagates any error from
    /// [`CatalogClient::fetch_page`].
    pub async fn fetch_category(
        &self,
        capture: &CapturedRequest,
        country: &CountryConfig,
        query: &str,
        limits: FetchLimits,
    ) -> Result<CategoryPages, ScraperError> {
        let mut fetched = CategoryPages::default();

        for page in 1..=limits.max_pages {
            if page > 1 && limits.page_delay_ms > 0 {
                tokio::time::sleep(jittered(limits.page_delay_ms)).await;
            }

            let value = self.fetch_page(capture, country, query, page).await?;
            let Some(items) = country
                .mapping
                .items
                .resolve(&value)
                .and_then(Value::as_array)
                .map(Vec::len)
            else {
                // Past page 1 a missing array is the end of the listing.
                if page == 1 {
                    return Err(ScraperError::SchemaMismatch {
                        context: format!("{}/{query}", country.key),
                        reason: format!(
                            "listing array not found at '{}'",
                            country.mapping.items.describe()
                        ),
                    });
                }
                tracing::debug!(country = %country.key, query, page, "no listing array, stopping");
                break;
            };

            if items == 0 {
                tracing::debug!(country = %country.key, query, page, "no listing items, stopping");
                break;
            }

            fetched.pages.push(value);
            fetched.item_count += items;
            tracing::debug!(
                country = %country.key,
                query,
                page,
                items,
                total = fetched.item_count,
                "fetched listing page"
            );

            if fetched.item_count >= limits.target_items {
                break;
            }
        }

        Ok(fetched)
    }
}

/// `base_ms` scaled by a random factor in `[0.75, 1.25)`.
#[must_use]
pub fn jittered(base_ms: u64) -> Duration {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let delay_ms = (base_ms as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    Duration::from_millis(delay_ms)
}
