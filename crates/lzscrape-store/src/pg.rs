//! Postgres-backed [`Warehouse`].

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use lzscrape_core::ProductRecord;
use sqlx::PgPool;

use crate::warehouse::{CountryHistory, StoredKey, Warehouse};
use crate::StoreError;

#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_in_transaction(&self, records: &[ProductRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for record in records {
            let result = sqlx::query(
                "INSERT INTO products \
                     (country, scrape_date, item_id, category, title, price, currency, \
                      seller, brand, original_price, discount_percent, price_display, \
                      rating, reviews, location, image_url, product_url, scraped_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
                 ON CONFLICT (country, scrape_date, category, item_id) DO UPDATE SET \
                     title            = EXCLUDED.title, \
                     price            = EXCLUDED.price, \
                     currency         = EXCLUDED.currency, \
                     seller           = EXCLUDED.seller, \
                     brand            = EXCLUDED.brand, \
                     original_price   = EXCLUDED.original_price, \
                     discount_percent = EXCLUDED.discount_percent, \
                     price_display    = EXCLUDED.price_display, \
                     rating           = EXCLUDED.rating, \
                     reviews          = EXCLUDED.reviews, \
                     location         = EXCLUDED.location, \
                     image_url        = EXCLUDED.image_url, \
                     product_url      = EXCLUDED.product_url, \
                     scraped_at       = EXCLUDED.scraped_at, \
                     updated_at       = NOW()",
            )
            .bind(&record.country)
            .bind(record.scrape_date())
            .bind(&record.item_id)
            .bind(&record.category)
            .bind(&record.title)
            .bind(record.price)
            .bind(&record.currency)
            .bind(&record.seller)
            .bind(&record.brand)
            .bind(record.original_price)
            .bind(record.discount_percent)
            .bind(&record.price_display)
            .bind(record.rating)
            .bind(record.reviews)
            .bind(&record.location)
            .bind(&record.image_url)
            .bind(&record.product_url)
            .bind(record.scraped_at)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn existing_keys(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Result<HashSet<StoredKey>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT category, item_id FROM products WHERE country = $1 AND scrape_date = $2",
        )
        .bind(country)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(category, item_id)| StoredKey { category, item_id })
            .collect())
    }

    async fn upsert(&self, records: &[ProductRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.upsert_in_transaction(records)
            .await
            .map_err(|e| StoreError::WarehouseUpload {
                reason: e.to_string(),
            })
    }

    async fn category_counts(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, i64>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT category, COUNT(*) FROM products \
             WHERE country = $1 AND scrape_date = $2 \
             GROUP BY category ORDER BY category",
        )
        .bind(country)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn history(&self, country: &str) -> Result<CountryHistory, StoreError> {
        let (days, total_rows, first_day, last_day) =
            sqlx::query_as::<_, (i64, i64, Option<NaiveDate>, Option<NaiveDate>)>(
                "SELECT COUNT(DISTINCT scrape_date), COUNT(*), MIN(scrape_date), MAX(scrape_date) \
                 FROM products WHERE country = $1",
            )
            .bind(country)
            .fetch_one(&self.pool)
            .await?;
        Ok(CountryHistory {
            days,
            total_rows,
            first_day,
            last_day,
        })
    }
}
