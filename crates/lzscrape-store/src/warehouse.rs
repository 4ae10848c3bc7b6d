use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use lzscrape_core::ProductRecord;

use crate::StoreError;

/// Lifetime totals for one country, shown by `verify --verbose`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryHistory {
    pub days: i64,
    pub total_rows: i64,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
}

/// A stored row's identity within one (country, scrape date).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredKey {
    pub category: String,
    pub item_id: String,
}

impl StoredKey {
    #[must_use]
    pub fn of(record: &ProductRecord) -> Self {
        Self {
            category: record.category.clone(),
            item_id: record.item_id.clone(),
        }
    }
}

/// The durable product table, keyed by (country, scrape date, category,
/// item id). A listing that appears in two categories is two rows.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Rows already stored for `country` on `date`.
    async fn existing_keys(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Result<HashSet<StoredKey>, StoreError>;

    /// Insert or overwrite `records` atomically. Returns rows written.
    async fn upsert(&self, records: &[ProductRecord]) -> Result<u64, StoreError>;

    /// Stored rows per category for `country` on `date`.
    async fn category_counts(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, i64>, StoreError>;

    async fn history(&self, country: &str) -> Result<CountryHistory, StoreError>;
}
