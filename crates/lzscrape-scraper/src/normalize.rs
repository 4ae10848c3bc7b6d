//! Maps one raw listing page into [`ProductRecord`]s using a country's
//! [`FieldMapping`](lzscrape_core::FieldMapping).
//!
//! A page is all-or-nothing: if any listing item lacks a required field the
//! whole page is rejected with [`ScraperError::SchemaMismatch`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use lzscrape_core::{CountryConfig, FieldPaths, ProductRecord};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::error::ScraperError;

/// Normalizes every listing item on `page`.
///
/// # Errors
///
/// Returns [`ScraperError::SchemaMismatch`] if the listing array is missing,
/// or any item lacks an id, title, or parseable price.
pub fn normalize_page(
    page: &Value,
    country: &CountryConfig,
    category: &str,
    scraped_at: DateTime<Utc>,
) -> Result<Vec<ProductRecord>, ScraperError> {
    let mapping = &country.mapping;
    let context = format!("{}/{category}", country.key);

    let items = mapping
        .items
        .resolve(page)
        .and_then(Value::as_array)
        .ok_or_else(|| ScraperError::SchemaMismatch {
            context: context.clone(),
            reason: format!("listing array not found at '{}'", mapping.items.describe()),
        })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let missing = |field: &str, paths: &FieldPaths| ScraperError::SchemaMismatch {
                context: context.clone(),
                reason: format!(
                    "item {index} has no usable '{field}' at '{}'",
                    paths.describe()
                ),
            };

            let item_id = text_at(item, Some(&mapping.id)).ok_or_else(|| missing("id", &mapping.id))?;
            let title =
                text_at(item, Some(&mapping.title)).ok_or_else(|| missing("title", &mapping.title))?;
            let price = mapping
                .price
                .resolve(item)
                .and_then(parse_decimal)
                .ok_or_else(|| missing("price", &mapping.price))?;

            let original_price = decimal_at(item, mapping.original_price.as_ref());
            let discount_percent = original_price.and_then(|orig| discount_percent(orig, price));

            Ok(ProductRecord {
                item_id,
                title,
                price,
                currency: text_at(item, mapping.currency.as_ref())
                    .unwrap_or_else(|| country.currency.clone()),
                category: category.to_owned(),
                country: country.key.clone(),
                seller: text_at(item, mapping.seller.as_ref()),
                brand: text_at(item, mapping.brand.as_ref()),
                original_price,
                discount_percent,
                price_display: text_at(item, mapping.price_display.as_ref()),
                rating: float_at(item, mapping.rating.as_ref()),
                reviews: int_at(item, mapping.reviews.as_ref()),
                location: text_at(item, mapping.location.as_ref()),
                image_url: text_at(item, mapping.image.as_ref()).map(absolute_url),
                product_url: text_at(item, mapping.url.as_ref()).map(absolute_url),
                scraped_at,
            })
        })
        .collect()
}

/// `(original - price) / original * 100` to one decimal, only for real discounts.
#[must_use]
pub fn discount_percent(original: Decimal, price: Decimal) -> Option<Decimal> {
    if original <= price || original <= Decimal::ZERO {
        return None;
    }
    let pct = (original - price) / original * Decimal::ONE_HUNDRED;
    Some(pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

/// Parses a JSON number or a price string such as `"฿1,299.00"`,
/// `"Rp 1.299.000"` or `"RM12,50"`.
#[must_use]
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => parse_price_text(s),
        _ => None,
    }
}

fn parse_price_text(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',');
    if cleaned.is_empty() {
        return None;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let canonical = match (dots, commas) {
        (_, 0) if dots > 1 => cleaned.replace('.', ""),
        (0, 1) if decimal_comma(cleaned) => cleaned.replace(',', "."),
        (0, _) => cleaned.replace(',', ""),
        (1, _) if cleaned.rfind('.') > cleaned.rfind(',') => cleaned.replace(',', ""),
        // "1.299,50": dots group thousands, the comma is the decimal point.
        _ => cleaned.replace('.', "").replace(',', "."),
    };

    Decimal::from_str(&canonical).ok()
}

/// `"12,50"` is a decimal comma; `"1,299"` groups thousands.
fn decimal_comma(s: &str) -> bool {
    s.rsplit_once(',')
        .is_some_and(|(_, frac)| (1..=2).contains(&frac.len()))
}

fn text_at(item: &Value, paths: Option<&FieldPaths>) -> Option<String> {
    match paths?.resolve(item)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decimal_at(item: &Value, paths: Option<&FieldPaths>) -> Option<Decimal> {
    paths?.resolve(item).and_then(parse_decimal)
}

fn float_at(item: &Value, paths: Option<&FieldPaths>) -> Option<f64> {
    let value = paths?.resolve(item)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn int_at(item: &Value, paths: Option<&FieldPaths>) -> Option<i64> {
    match paths?.resolve(item)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().ok()
        }
        _ => None,
    }
}

/// Listing URLs are often protocol-relative (`//www.lazada.co.th/...`).
fn absolute_url(url: String) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
