//! Sequential country → category → page scrape.
//!
//! Category failures are recorded and the run moves on. An expired session
//! ends the current country. A backup write failure halts the whole run,
//! since nothing after it would be durable.

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, Utc};
use lzscrape_core::{
    AppConfig, CategoryConfig, CategoryOutcome, CountryConfig, CountryOutcome, CountryStatus,
    RunSummary, ScrapeRun,
};
use lzscrape_scraper::{
    jittered, normalize_page, CapturedRequest, CatalogClient, FetchLimits, ScraperError,
};
use lzscrape_store::{DuplicateGuard, GuardDecision, PersistenceSink, StoreError};
use tracing::Instrument;

use crate::prompt::Confirm;

pub(crate) struct Orchestrator<'a> {
    pub config: &'a AppConfig,
    pub countries: &'a [CountryConfig],
    pub categories: &'a [CategoryConfig],
    pub client: &'a CatalogClient,
    pub sink: &'a PersistenceSink,
}

/// Why a single category did not complete.
enum CategoryError {
    Scrape(ScraperError),
    Backup(StoreError),
}

impl From<ScraperError> for CategoryError {
    fn from(e: ScraperError) -> Self {
        Self::Scrape(e)
    }
}

impl From<StoreError> for CategoryError {
    fn from(e: StoreError) -> Self {
        Self::Backup(e)
    }
}

impl fmt::Display for CategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scrape(e) => write!(f, "{e}"),
            Self::Backup(e) => write!(f, "{e}"),
        }
    }
}

/// A country cut short by a backup failure, with what it finished first.
struct Halted {
    outcome: CountryOutcome,
    reason: String,
}

impl Orchestrator<'_> {
    pub(crate) async fn run(&self, confirm: &mut dyn Confirm) -> RunSummary {
        let run = ScrapeRun::start();
        let span = tracing::info_span!("scrape_run", run_id = %run.run_id);
        self.run_countries(run, confirm).instrument(span).await
    }

    async fn run_countries(&self, mut run: ScrapeRun, confirm: &mut dyn Confirm) -> RunSummary {
        tracing::info!(
            countries = self.countries.len(),
            categories = self.categories.len(),
            "scrape run started"
        );

        let mut halted = None;
        for country in self.countries {
            let span = tracing::info_span!("country", country = %country.key);
            match self.scrape_country(country, confirm).instrument(span).await {
                Ok(outcome) => run.record_country(outcome),
                Err(Halted { outcome, reason }) => {
                    tracing::error!(country = %country.key, reason = %reason, "run halted");
                    run.record_country(outcome);
                    halted = Some(reason);
                    break;
                }
            }
        }

        let summary = run.finish(Utc::now(), halted);
        tracing::info!(
            products = summary.total_products(),
            succeeded = summary.succeeded_categories(),
            categories = summary.total_categories(),
            "scrape run finished"
        );
        summary
    }

    async fn scrape_country(
        &self,
        country: &CountryConfig,
        confirm: &mut dyn Confirm,
    ) -> Result<CountryOutcome, Halted> {
        let capture_path = country.capture_path(&self.config.capture_dir);
        let capture = match CapturedRequest::from_file(&capture_path, &country.capture) {
            Ok(capture) => capture,
            Err(e) => {
                tracing::error!(
                    path = %capture_path.display(),
                    error = %e,
                    "capture rejected, skipping country"
                );
                return Ok(CountryOutcome::new(
                    &country.key,
                    &country.name,
                    CountryStatus::InvalidCapture {
                        reason: e.to_string(),
                    },
                ));
            }
        };

        let today = Utc::now().date_naive();
        let mut guard = self.load_guard(&country.key, today).await;
        if let GuardDecision::NeedsConfirmation { existing } = guard.decision() {
            let question = format!(
                "{} already has {existing} products stored for {today}. Scrape again and overwrite them?",
                country.name
            );
            if !confirm.confirm(&question) {
                tracing::info!(existing, "operator skipped country");
                return Ok(CountryOutcome::new(
                    &country.key,
                    &country.name,
                    CountryStatus::SkippedByOperator,
                ));
            }
        }

        let mut outcome = CountryOutcome::new(&country.key, &country.name, CountryStatus::Completed);
        let mut halt_reason = None;

        for (idx, category) in self.categories.iter().enumerate() {
            if idx > 0 && self.config.category_delay_ms > 0 {
                tokio::time::sleep(jittered(self.config.category_delay_ms)).await;
            }

            match self.scrape_category(country, &capture, category, &mut guard).await {
                Ok(category_outcome) => outcome.categories.push(category_outcome),
                Err(CategoryError::Scrape(e)) if e.is_auth_expired() => {
                    tracing::error!(category = %category.name, error = %e, "session expired");
                    outcome
                        .categories
                        .push(CategoryOutcome::failed(&category.name, e.to_string()));
                    outcome.status = CountryStatus::AuthExpired {
                        category: category.name.clone(),
                    };
                    break;
                }
                Err(CategoryError::Scrape(e)) => {
                    tracing::warn!(category = %category.name, error = %e, "category failed");
                    outcome
                        .categories
                        .push(CategoryOutcome::failed(&category.name, e.to_string()));
                }
                Err(e @ CategoryError::Backup(_)) => {
                    let reason = format!("{}/{}: {e}", country.key, category.name);
                    outcome
                        .categories
                        .push(CategoryOutcome::failed(&category.name, e.to_string()));
                    halt_reason = Some(reason);
                    break;
                }
            }
        }

        let done = outcome.categories.len();
        outcome.categories.extend(
            self.categories[done..]
                .iter()
                .map(|c| CategoryOutcome::not_attempted(&c.name)),
        );

        match halt_reason {
            Some(reason) => Err(Halted { outcome, reason }),
            None => {
                tracing::info!(
                    succeeded = outcome.succeeded_categories(),
                    categories = outcome.categories.len(),
                    products = outcome.total_products(),
                    "country finished"
                );
                Ok(outcome)
            }
        }
    }

    /// An unreadable warehouse is treated as holding nothing for today; the
    /// upsert still keeps rows unique.
    async fn load_guard(&self, country: &str, today: NaiveDate) -> DuplicateGuard {
        match DuplicateGuard::load(self.sink.warehouse().as_ref(), country, today).await {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(error = %e, "could not read today's stored ids");
                DuplicateGuard::from_existing(country, today, HashSet::new())
            }
        }
    }

    /// Point `guard` at `date` when a country's scrape crosses UTC midnight.
    /// The operator's earlier answer still stands for the new day.
    pub(crate) async fn roll_guard(&self, guard: &mut DuplicateGuard, date: NaiveDate) {
        if guard.date() != date {
            tracing::info!(from = %guard.date(), to = %date, "scrape date rolled over");
            let country = guard.country().to_string();
            *guard = self.load_guard(&country, date).await;
        }
    }

    async fn scrape_category(
        &self,
        country: &CountryConfig,
        capture: &CapturedRequest,
        category: &CategoryConfig,
        guard: &mut DuplicateGuard,
    ) -> Result<CategoryOutcome, CategoryError> {
        let limits = FetchLimits {
            max_pages: self.config.max_pages,
            target_items: self.config.target_products_per_category,
            page_delay_ms: self.config.page_delay_ms,
        };
        let fetched = self
            .client
            .fetch_category(capture, country, &category.query, limits)
            .await?;

        let scraped_at = Utc::now();
        let mut records = Vec::with_capacity(fetched.item_count);
        for page in &fetched.pages {
            records.extend(normalize_page(page, country, &category.name, scraped_at)?);
        }

        if records.is_empty() {
            tracing::warn!(category = %category.name, "no products returned");
            return Ok(CategoryOutcome::failed(&category.name, "no products returned"));
        }

        self.roll_guard(guard, scraped_at.date_naive()).await;
        let prepared = guard.prepare(records);
        let report = self
            .sink
            .write(&prepared.records, &country.key, guard.date(), &category.slug())
            .await?;

        let pages = u32::try_from(fetched.pages.len()).unwrap_or(u32::MAX);
        tracing::info!(
            category = %category.name,
            products = report.backed_up,
            uploaded = report.uploaded,
            collapsed = prepared.collapsed,
            pages,
            "category scraped"
        );

        let mut outcome = CategoryOutcome::succeeded(&category.name, report.backed_up, pages);
        outcome.warehouse_error = report.warehouse_error;
        Ok(outcome)
    }
}
