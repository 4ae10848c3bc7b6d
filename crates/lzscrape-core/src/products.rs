use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One marketplace listing, normalized across country sites.
///
/// Field order is the column order of the CSV backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Marketplace item id. Unique within (country, scrape date).
    pub item_id: String,
    pub title: String,
    pub price: Decimal,
    /// ISO 4217 code, e.g. `"THB"`.
    pub currency: String,
    pub category: String,
    /// Country key from `countries.yaml`, e.g. `"thailand"`.
    pub country: String,
    pub seller: Option<String>,
    pub brand: Option<String>,
    /// Pre-discount price, when the listing shows one.
    pub original_price: Option<Decimal>,
    /// `(original - price) / original * 100`, one decimal place.
    pub discount_percent: Option<Decimal>,
    /// Price as the site renders it, e.g. `"฿1,299.00"`.
    pub price_display: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<i64>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    /// UTC calendar day the record belongs to for same-day dedup.
    #[must_use]
    pub fn scrape_date(&self) -> NaiveDate {
        self.scraped_at.date_naive()
    }

    /// Returns `true` when the listing is below its original price.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.original_price.is_some_and(|orig| orig > self.price)
    }
}
