//! Today's per-country check against the warehouse.
//!
//! Read-only. A country whose counts cannot be queried is reported with every
//! category missing so the problem surfaces as issues rather than a crash.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;
use lzscrape_core::{AppConfig, CategoryConfig, CountryConfig};
use lzscrape_store::{CountryHistory, Warehouse};

/// Share of the target total a healthy day must reach, in percent.
const HEALTHY_PERCENT: i64 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CountryCheck {
    pub name: String,
    pub counts: BTreeMap<String, i64>,
    pub missing: Vec<String>,
    pub low: Vec<(String, i64)>,
    pub history: Option<CountryHistory>,
    pub error: Option<String>,
}

impl CountryCheck {
    fn total_products(&self) -> i64 {
        self.counts.values().sum()
    }

    fn categories_done(&self) -> usize {
        self.counts.len()
    }

    fn issue_count(&self) -> usize {
        self.missing.len() + self.low.len()
    }

    pub(crate) fn status(&self) -> Status {
        if self.total_products() == 0 {
            Status::Fail
        } else if self.issue_count() > 0 {
            Status::Warn
        } else {
            Status::Ok
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VerifyReport {
    pub date: NaiveDate,
    pub expected_categories: usize,
    pub min_per_category: i64,
    pub target_total: i64,
    pub countries: Vec<CountryCheck>,
}

impl VerifyReport {
    pub(crate) async fn collect(
        warehouse: &dyn Warehouse,
        countries: &[CountryConfig],
        categories: &[CategoryConfig],
        config: &AppConfig,
        date: NaiveDate,
        verbose: bool,
    ) -> Self {
        let min_per_category = to_i64(config.min_products_per_category);
        let target_total = to_i64(categories.len())
            .saturating_mul(to_i64(config.target_products_per_category))
            .saturating_mul(to_i64(countries.len()));

        let mut checks = Vec::with_capacity(countries.len());
        for country in countries {
            let check = match warehouse.category_counts(&country.key, date).await {
                Ok(counts) => {
                    let mut missing = Vec::new();
                    let mut low = Vec::new();
                    for category in categories {
                        match counts.get(&category.name) {
                            None => missing.push(category.name.clone()),
                            Some(&n) if n < min_per_category => {
                                low.push((category.name.clone(), n));
                            }
                            Some(_) => {}
                        }
                    }
                    let history = if verbose {
                        warehouse.history(&country.key).await.ok()
                    } else {
                        None
                    };
                    CountryCheck {
                        name: country.name.clone(),
                        counts,
                        missing,
                        low,
                        history,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(country = %country.key, error = %e, "verification query failed");
                    CountryCheck {
                        name: country.name.clone(),
                        counts: BTreeMap::new(),
                        missing: categories.iter().map(|c| c.name.clone()).collect(),
                        low: Vec::new(),
                        history: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            checks.push(check);
        }

        Self {
            date,
            expected_categories: categories.len(),
            min_per_category,
            target_total,
            countries: checks,
        }
    }

    pub(crate) fn total_products(&self) -> i64 {
        self.countries.iter().map(CountryCheck::total_products).sum()
    }

    fn progress_percent(&self) -> i64 {
        if self.target_total > 0 {
            self.total_products().saturating_mul(100) / self.target_total
        } else {
            0
        }
    }

    fn has_issues(&self) -> bool {
        self.countries.iter().any(|c| c.issue_count() > 0)
    }

    /// No missing or low categories and at least 80 % of the target total.
    pub(crate) fn is_healthy(&self) -> bool {
        !self.has_issues()
            && self.total_products().saturating_mul(100)
                >= self.target_total.saturating_mul(HEALTHY_PERCENT)
    }

    pub(crate) fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let thin = "-".repeat(60);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "DAILY CHECK");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Date: {}   Target: {} products", self.date, self.target_total);
        let _ = writeln!(out);
        let _ = writeln!(out, "COUNTRY      CATS   PRODUCTS   STATUS   ISSUES");
        let _ = writeln!(out, "{thin}");

        let mut categories_done = 0;
        for check in &self.countries {
            let issues = match check.issue_count() {
                0 => "-".to_string(),
                n => format!("{n} issues"),
            };
            let _ = writeln!(
                out,
                "{:<12} {:>2}/{:<3} {:>8}   {:<6}   {issues}",
                check.name,
                check.categories_done(),
                self.expected_categories,
                check.total_products(),
                check.status().label(),
            );
            categories_done += check.categories_done();
        }

        let _ = writeln!(out, "{thin}");
        let overall = if self.is_healthy() { "OK" } else { "WARN" };
        let _ = writeln!(
            out,
            "{:<12} {:>2}/{:<3} {:>8}   {:<6}   {}%",
            "TOTAL",
            categories_done,
            self.expected_categories * self.countries.len(),
            self.total_products(),
            overall,
            self.progress_percent(),
        );
        let _ = writeln!(out, "{rule}");

        self.render_issues(&mut out, verbose);
        if verbose {
            self.render_details(&mut out);
        }
        out.truncate(out.trim_end().len());
        out
    }

    fn render_issues(&self, out: &mut String, verbose: bool) {
        let mut lines = Vec::new();
        for check in &self.countries {
            if let Some(error) = &check.error {
                lines.push(format!("{}: query failed: {error}", check.name));
            }
            if !check.missing.is_empty() {
                lines.push(format!(
                    "{}: {} missing categories",
                    check.name,
                    check.missing.len()
                ));
                if verbose {
                    lines.push(format!("   Missing: {}", check.missing.join(", ")));
                }
            }
            if !check.low.is_empty() {
                lines.push(format!(
                    "{}: {} categories < {} products",
                    check.name,
                    check.low.len(),
                    self.min_per_category
                ));
                if verbose {
                    let low: Vec<String> = check
                        .low
                        .iter()
                        .map(|(name, n)| format!("{name} ({n})"))
                        .collect();
                    lines.push(format!("   Low counts: {}", low.join(", ")));
                }
            }
        }

        if lines.is_empty() {
            let _ = writeln!(out, "All good, nothing to do.");
            return;
        }
        let _ = writeln!(out, "ISSUES FOUND:");
        for line in lines {
            let _ = writeln!(out, "   {line}");
        }
        let _ = writeln!(
            out,
            "Next step: capture fresh curl files and re-run the scraper for the affected countries"
        );
    }

    fn render_details(&self, out: &mut String) {
        let _ = writeln!(out);
        let _ = writeln!(out, "DETAILS");
        for check in &self.countries {
            let _ = writeln!(out, "{}:", check.name);
            if check.counts.is_empty() {
                let _ = writeln!(out, "   no products today");
            }
            for (category, n) in &check.counts {
                let marker = if *n < self.min_per_category { " (low)" } else { "" };
                let _ = writeln!(out, "   {category:<32} {n:>5}{marker}");
            }
            if let Some(history) = &check.history {
                let span = match (history.first_day, history.last_day) {
                    (Some(first), Some(last)) => format!(", {first} to {last}"),
                    _ => String::new(),
                };
                let _ = writeln!(
                    out,
                    "   history: {} days, {} rows{span}",
                    history.days, history.total_rows
                );
            }
        }
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "verify_test.rs"]
mod tests;
