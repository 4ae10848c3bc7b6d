//! Same-day duplicate protection.
//!
//! Before a country is scraped the guard loads the rows already stored for
//! that (country, day). If any exist the operator must confirm before the run
//! overwrites them. Each category batch is then collapsed on (category, item
//! id) and checked against the known set, which grows as batches are written.
//! The same listing under two categories is two rows, not a duplicate.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use lzscrape_core::ProductRecord;

use crate::warehouse::{StoredKey, Warehouse};
use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    /// Records already exist for the day and the operator must confirm.
    NeedsConfirmation { existing: usize },
}

/// A category batch ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch {
    /// One record per (category, item id), in first-seen order.
    pub records: Vec<ProductRecord>,
    /// Duplicates dropped within the batch itself.
    pub collapsed: usize,
    /// Records that will overwrite a row already stored today.
    pub replaced: usize,
}

#[derive(Debug, Clone)]
pub struct DuplicateGuard {
    country: String,
    date: NaiveDate,
    known: HashSet<StoredKey>,
    preexisting: usize,
}

impl DuplicateGuard {
    /// Load the rows already stored for `country` on `date`.
    ///
    /// # Errors
    ///
    /// Propagates warehouse query failures.
    pub async fn load(
        warehouse: &dyn Warehouse,
        country: &str,
        date: NaiveDate,
    ) -> Result<Self, StoreError> {
        let known = warehouse.existing_keys(country, date).await?;
        Ok(Self::from_existing(country, date, known))
    }

    #[must_use]
    pub fn from_existing(country: &str, date: NaiveDate, known: HashSet<StoredKey>) -> Self {
        let preexisting = known.len();
        Self {
            country: country.to_string(),
            date,
            known,
            preexisting,
        }
    }

    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn decision(&self) -> GuardDecision {
        if self.preexisting == 0 {
            GuardDecision::Proceed
        } else {
            GuardDecision::NeedsConfirmation {
                existing: self.preexisting,
            }
        }
    }

    /// Collapse duplicates in `batch`, keeping the last occurrence's values
    /// at the first occurrence's position, and record the keys as known.
    pub fn prepare(&mut self, batch: Vec<ProductRecord>) -> PreparedBatch {
        let total = batch.len();
        let mut position: HashMap<StoredKey, usize> = HashMap::with_capacity(total);
        let mut records: Vec<ProductRecord> = Vec::with_capacity(total);

        for record in batch {
            let key = StoredKey::of(&record);
            if let Some(&idx) = position.get(&key) {
                records[idx] = record;
            } else {
                position.insert(key, records.len());
                records.push(record);
            }
        }

        let mut replaced = 0;
        for record in &records {
            if !self.known.insert(StoredKey::of(record)) {
                replaced += 1;
            }
        }

        if replaced > 0 {
            tracing::info!(
                country = %self.country,
                date = %self.date,
                replaced,
                "overwriting records already stored today"
            );
        }

        PreparedBatch {
            collapsed: total - records.len(),
            replaced,
            records,
        }
    }
}
