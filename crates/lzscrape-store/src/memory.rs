//! In-process [`Warehouse`] with the same keying as the Postgres table.
//! Used by tests and offline runs.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use lzscrape_core::ProductRecord;

use crate::warehouse::{CountryHistory, StoredKey, Warehouse};
use crate::StoreError;

/// (country, scrape date, category, item id)
type RowKey = (String, NaiveDate, String, String);

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    rows: Mutex<BTreeMap<RowKey, ProductRecord>>,
    fail_uploads: AtomicBool,
    upload_calls: AtomicUsize,
}

impl MemoryWarehouse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent [`Warehouse::upsert`] fail.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Number of `upsert` calls made, successful or not.
    #[must_use]
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of all stored rows in key order.
    #[must_use]
    pub fn rows(&self) -> Vec<ProductRecord> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<RowKey, ProductRecord>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn existing_keys(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Result<HashSet<StoredKey>, StoreError> {
        Ok(self
            .lock()
            .keys()
            .filter(|(c, d, _, _)| c == country && *d == date)
            .map(|(_, _, category, item_id)| StoredKey {
                category: category.clone(),
                item_id: item_id.clone(),
            })
            .collect())
    }

    async fn upsert(&self, records: &[ProductRecord]) -> Result<u64, StoreError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::WarehouseUpload {
                reason: "memory warehouse configured to fail".to_string(),
            });
        }
        let mut rows = self.lock();
        for record in records {
            let key = (
                record.country.clone(),
                record.scrape_date(),
                record.category.clone(),
                record.item_id.clone(),
            );
            rows.insert(key, record.clone());
        }
        Ok(records.len() as u64)
    }

    async fn category_counts(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, i64>, StoreError> {
        let mut counts = BTreeMap::new();
        for (c, d, category, _) in self.lock().keys() {
            if c == country && *d == date {
                *counts.entry(category.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn history(&self, country: &str) -> Result<CountryHistory, StoreError> {
        let rows = self.lock();
        let mut days = BTreeSet::new();
        let mut total_rows = 0i64;
        for (c, d, _, _) in rows.keys() {
            if c == country {
                days.insert(*d);
                total_rows += 1;
            }
        }
        Ok(CountryHistory {
            days: i64::try_from(days.len()).unwrap_or(i64::MAX),
            total_rows,
            first_day: days.first().copied(),
            last_day: days.last().copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;

    fn record(country: &str, day: u32, id: &str, category: &str, price: &str) -> ProductRecord {
        ProductRecord {
            item_id: id.to_string(),
            title: format!("Item {id}"),
            price: Decimal::from_str(price).unwrap(),
            currency: "THB".to_string(),
            category: category.to_string(),
            country: country.to_string(),
            seller: None,
            brand: None,
            original_price: None,
            discount_percent: None,
            price_display: None,
            rating: None,
            reviews: None,
            location: None,
            image_url: None,
            product_url: None,
            scraped_at: Utc.with_ymd_and_hms(2024, 5, day, 6, 0, 0).unwrap(),
        }
    }

    fn may(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[tokio::test]
    async fn upsert_same_record_twice_keeps_latest_values() {
        let wh = MemoryWarehouse::new();
        wh.upsert(&[record("thailand", 1, "42", "Hair Care", "10.00")])
            .await
            .unwrap();
        wh.upsert(&[record("thailand", 1, "42", "Hair Care", "12.50")])
            .await
            .unwrap();

        let rows = wh.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, Decimal::from_str("12.50").unwrap());
    }

    #[tokio::test]
    async fn same_item_on_another_day_is_a_new_row() {
        let wh = MemoryWarehouse::new();
        wh.upsert(&[
            record("thailand", 1, "42", "Hair Care", "10"),
            record("thailand", 2, "42", "Hair Care", "10"),
            record("indonesia", 1, "42", "Hair Care", "10"),
        ])
        .await
        .unwrap();

        assert_eq!(wh.rows().len(), 3);
        let keys = wh.existing_keys("thailand", may(1)).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&StoredKey {
            category: "Hair Care".to_string(),
            item_id: "42".to_string(),
        }));
    }

    #[tokio::test]
    async fn same_item_in_two_categories_keeps_both_rows() {
        let wh = MemoryWarehouse::new();
        wh.upsert(&[record("thailand", 1, "42", "Shampoo", "10")])
            .await
            .unwrap();
        wh.upsert(&[record("thailand", 1, "42", "Conditioner", "11")])
            .await
            .unwrap();

        assert_eq!(wh.rows().len(), 2);
        let counts = wh.category_counts("thailand", may(1)).await.unwrap();
        assert_eq!(counts.get("Shampoo"), Some(&1));
        assert_eq!(counts.get("Conditioner"), Some(&1));
        assert_eq!(wh.existing_keys("thailand", may(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn category_counts_and_history() {
        let wh = MemoryWarehouse::new();
        wh.upsert(&[
            record("thailand", 1, "1", "Hair Care", "10"),
            record("thailand", 1, "2", "Hair Care", "10"),
            record("thailand", 1, "3", "Skin Care", "10"),
            record("thailand", 3, "1", "Hair Care", "10"),
        ])
        .await
        .unwrap();

        let counts = wh.category_counts("thailand", may(1)).await.unwrap();
        assert_eq!(counts.get("Hair Care"), Some(&2));
        assert_eq!(counts.get("Skin Care"), Some(&1));

        let history = wh.history("thailand").await.unwrap();
        assert_eq!(
            history,
            CountryHistory {
                days: 2,
                total_rows: 4,
                first_day: Some(may(1)),
                last_day: Some(may(3)),
            }
        );
        assert_eq!(wh.history("malaysia").await.unwrap(), CountryHistory::default());
    }

    #[tokio::test]
    async fn failing_upload_is_counted_and_stores_nothing() {
        let wh = MemoryWarehouse::new();
        wh.set_fail_uploads(true);
        let err = wh
            .upsert(&[record("thailand", 1, "1", "Hair Care", "10")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WarehouseUpload { .. }));
        assert_eq!(wh.upload_calls(), 1);
        assert!(wh.rows().is_empty());
    }
}
