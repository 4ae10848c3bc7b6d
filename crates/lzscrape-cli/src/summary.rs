//! Human-readable end-of-run summary.

use std::fmt::Write;
use std::path::Path;

use lzscrape_core::{CategoryStatus, CountryConfig, CountryOutcome, CountryStatus, RunSummary};

pub(crate) fn render(summary: &RunSummary, countries: &[CountryConfig], backup_dir: &Path) -> String {
    let mut out = String::new();
    let elapsed = (summary.finished_at - summary.started_at).num_seconds().max(0);

    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(
        out,
        "Run {} finished in {}m {:02}s",
        summary.run_id,
        elapsed / 60,
        elapsed % 60
    );
    let _ = writeln!(out, "{}", "-".repeat(60));

    for country in &summary.countries {
        render_country(&mut out, country, countries);
    }

    let _ = writeln!(out, "{}", "-".repeat(60));
    let _ = writeln!(
        out,
        "TOTAL        {}/{} categories   {} products",
        summary.succeeded_categories(),
        summary.total_categories(),
        summary.total_products()
    );

    let warehouse_failures = summary.warehouse_failures();
    if warehouse_failures > 0 {
        let _ = writeln!(
            out,
            "Warehouse upload failed for {warehouse_failures} categories; their rows are in the CSV backup under {}",
            backup_dir.display()
        );
    }
    if let Some(reason) = &summary.halted {
        let _ = writeln!(out, "HALTED: backup write failed ({reason}); remaining countries were not scraped");
    }
    let _ = write!(
        out,
        "Result: {}",
        if summary.is_success() { "OK" } else { "FAILED" }
    );
    out
}

fn render_country(out: &mut String, country: &CountryOutcome, configs: &[CountryConfig]) {
    match &country.status {
        CountryStatus::SkippedByOperator => {
            let _ = writeln!(out, "{:<12} skipped (today's data kept)", country.name);
            return;
        }
        CountryStatus::InvalidCapture { reason } => {
            let _ = writeln!(out, "{:<12} capture invalid: {reason}", country.name);
        }
        CountryStatus::Completed | CountryStatus::AuthExpired { .. } => {
            let _ = writeln!(
                out,
                "{:<12} {}/{} categories   {} products",
                country.name,
                country.succeeded_categories(),
                country.categories.len(),
                country.total_products()
            );
        }
    }

    if let CountryStatus::AuthExpired { category } = &country.status {
        let _ = writeln!(out, "    session expired during '{category}'");
    }

    for category in &country.categories {
        if let CategoryStatus::Failed { reason } = &category.status {
            let _ = writeln!(out, "    failed: {}: {reason}", category.category);
        }
    }

    let not_attempted = country
        .categories
        .iter()
        .filter(|c| c.status == CategoryStatus::NotAttempted)
        .count();
    if not_attempted > 0 {
        let _ = writeln!(out, "    not attempted: {not_attempted} categories");
    }

    if let Some(config) = configs.iter().find(|c| c.key == country.key) {
        if let Some(fix) = country.remediation(&config.capture_file, &config.domain) {
            let _ = writeln!(out, "    fix: {fix}");
        }
    }
}
