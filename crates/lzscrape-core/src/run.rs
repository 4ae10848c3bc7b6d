//! In-memory bookkeeping for one scraper invocation.
//!
//! A [`ScrapeRun`] is created when the orchestrator starts, receives one
//! [`CountryOutcome`] per configured country, and is finalized into a
//! [`RunSummary`] for reporting. Nothing here is persisted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryStatus {
    Succeeded,
    Failed { reason: String },
    /// Skipped because the country stopped early (expired session or halt).
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub category: String,
    pub status: CategoryStatus,
    /// Records written to the backup for this category.
    pub products: usize,
    pub pages: u32,
    /// Set when the backup succeeded but the warehouse upload did not.
    pub warehouse_error: Option<String>,
}

impl CategoryOutcome {
    #[must_use]
    pub fn succeeded(category: impl Into<String>, products: usize, pages: u32) -> Self {
        Self {
            category: category.into(),
            status: CategoryStatus::Succeeded,
            products,
            pages,
            warehouse_error: None,
        }
    }

    #[must_use]
    pub fn failed(category: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            status: CategoryStatus::Failed {
                reason: reason.into(),
            },
            products: 0,
            pages: 0,
            warehouse_error: None,
        }
    }

    #[must_use]
    pub fn not_attempted(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            status: CategoryStatus::NotAttempted,
            products: 0,
            pages: 0,
            warehouse_error: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == CategoryStatus::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryStatus {
    Completed,
    /// Same-day data existed and the operator chose not to continue.
    SkippedByOperator,
    /// Capture file missing, unparseable, or lacking required headers/cookies.
    InvalidCapture { reason: String },
    /// The site rejected the session partway through.
    AuthExpired { category: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryOutcome {
    pub key: String,
    pub name: String,
    pub status: CountryStatus,
    pub categories: Vec<CategoryOutcome>,
}

impl CountryOutcome {
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>, status: CountryStatus) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            status,
            categories: Vec::new(),
        }
    }

    #[must_use]
    pub fn succeeded_categories(&self) -> usize {
        self.categories.iter().filter(|c| c.is_success()).count()
    }

    /// Categories that were actually tried (success or failure).
    #[must_use]
    pub fn attempted_categories(&self) -> usize {
        self.categories
            .iter()
            .filter(|c| c.status != CategoryStatus::NotAttempted)
            .count()
    }

    #[must_use]
    pub fn total_products(&self) -> usize {
        self.categories.iter().map(|c| c.products).sum()
    }

    /// `true` when this country should make the process exit non-zero.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self.status {
            CountryStatus::InvalidCapture { .. } | CountryStatus::AuthExpired { .. } => true,
            CountryStatus::SkippedByOperator => false,
            CountryStatus::Completed => {
                !self.categories.is_empty() && self.succeeded_categories() == 0
            }
        }
    }

    /// Operator-facing fix for a fatal country, if one applies.
    #[must_use]
    pub fn remediation(&self, capture_file: &str, domain: &str) -> Option<String> {
        match self.status {
            CountryStatus::InvalidCapture { .. } | CountryStatus::AuthExpired { .. } => Some(format!(
                "open https://www.{domain}/ in a browser, search for any product, pass any robot challenge, then copy the listing request as cURL into {capture_file} and re-run"
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub countries: Vec<CountryOutcome>,
}

impl ScrapeRun {
    #[must_use]
    pub fn start() -> Self {
        Self::start_at(Utc::now())
    }

    #[must_use]
    pub fn start_at(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            countries: Vec::new(),
        }
    }

    pub fn record_country(&mut self, outcome: CountryOutcome) {
        self.countries.push(outcome);
    }

    /// Finalize the run. `halted` carries the reason when a durability error
    /// stopped the run before all countries were processed.
    #[must_use]
    pub fn finish(self, finished_at: DateTime<Utc>, halted: Option<String>) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at,
            countries: self.countries,
            halted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub countries: Vec<CountryOutcome>,
    pub halted: Option<String>,
}

impl RunSummary {
    #[must_use]
    pub fn total_products(&self) -> usize {
        self.countries.iter().map(CountryOutcome::total_products).sum()
    }

    #[must_use]
    pub fn succeeded_categories(&self) -> usize {
        self.countries
            .iter()
            .map(CountryOutcome::succeeded_categories)
            .sum()
    }

    #[must_use]
    pub fn total_categories(&self) -> usize {
        self.countries.iter().map(|c| c.categories.len()).sum()
    }

    /// Categories whose backup landed but whose warehouse upload failed.
    #[must_use]
    pub fn warehouse_failures(&self) -> usize {
        self.countries
            .iter()
            .flat_map(|c| &c.categories)
            .filter(|c| c.warehouse_error.is_some())
            .count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.halted.is_none() && !self.countries.iter().any(CountryOutcome::is_fatal)
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }
}
