//! Per-country site configuration, including the field mapping table that
//! absorbs each marketplace's JSON shape differences.
//!
//! Loaded from `config/countries.yaml`. Country order in the file is the order
//! the orchestrator scrapes them in.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConfigError;

/// One or more dot-separated JSON paths for a single field.
///
/// Accepts either a bare string or a list in YAML. Resolution tries each path
/// in order and returns the first that points at a non-null value. Numeric
/// segments index into arrays (`"images.0"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "Vec<String>")]
pub struct FieldPaths(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for FieldPaths {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(path) => FieldPaths(vec![path]),
            OneOrMany::Many(paths) => FieldPaths(paths),
        }
    }
}

impl From<FieldPaths> for Vec<String> {
    fn from(value: FieldPaths) -> Self {
        value.0
    }
}

impl FieldPaths {
    #[must_use]
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPaths(paths.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.0
    }

    /// Returns the first non-null value reached by any of the paths.
    #[must_use]
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .find_map(|path| resolve_path(value, path).filter(|v| !v.is_null()))
    }

    /// Human-readable form used in error messages, e.g. `price|priceInfo.price`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.0.join("|")
    }
}

fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Where each [`crate::ProductRecord`] field lives in one country's listing JSON.
///
/// `items`, `id`, `title` and `price` are required; a page missing any of them
/// is rejected as a schema mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Path to the array of listing items within a page.
    pub items: FieldPaths,
    pub id: FieldPaths,
    pub title: FieldPaths,
    pub price: FieldPaths,
    #[serde(default)]
    pub currency: Option<FieldPaths>,
    #[serde(default)]
    pub original_price: Option<FieldPaths>,
    #[serde(default)]
    pub price_display: Option<FieldPaths>,
    #[serde(default)]
    pub seller: Option<FieldPaths>,
    #[serde(default)]
    pub brand: Option<FieldPaths>,
    #[serde(default)]
    pub rating: Option<FieldPaths>,
    #[serde(default)]
    pub reviews: Option<FieldPaths>,
    #[serde(default)]
    pub location: Option<FieldPaths>,
    #[serde(default)]
    pub image: Option<FieldPaths>,
    #[serde(default)]
    pub url: Option<FieldPaths>,
}

/// Minimum content a curl capture must carry before it is worth replaying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequirements {
    /// Header names (case-insensitive) that must all be present.
    #[serde(default = "default_required_headers")]
    pub required_headers: Vec<String>,
    /// Cookie names of which at least one must be present and non-empty.
    #[serde(default = "default_session_cookies")]
    pub session_cookies: Vec<String>,
}

impl Default for CaptureRequirements {
    fn default() -> Self {
        Self {
            required_headers: default_required_headers(),
            session_cookies: default_session_cookies(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryConfig {
    /// Stable lowercase identifier, used in file paths and the warehouse.
    pub key: String,
    pub name: String,
    pub domain: String,
    /// Curl capture file name, resolved against the capture directory.
    pub capture_file: String,
    /// Listing endpoint with `{query}`, `{tag}`, `{page}` and
    /// `{first_request}` placeholders.
    pub url_template: String,
    /// ISO 4217 code used when the listing does not carry a currency.
    pub currency: String,
    #[serde(default)]
    pub capture: CaptureRequirements,
    /// Body fragments that mean the session was challenged or rejected.
    #[serde(default = "default_auth_markers")]
    pub auth_markers: Vec<String>,
    pub mapping: FieldMapping,
}

impl CountryConfig {
    #[must_use]
    pub fn capture_path(&self, capture_dir: &Path) -> PathBuf {
        capture_dir.join(&self.capture_file)
    }
}

#[derive(Debug, Deserialize)]
pub struct CountryList {
    pub countries: Vec<CountryConfig>,
}

impl CountryList {
    /// Keeps only the countries whose key is in `keys`, preserving file order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a requested key is not configured.
    pub fn restrict_to(self, keys: &[String]) -> Result<Self, ConfigError> {
        if keys.is_empty() {
            return Ok(self);
        }
        for key in keys {
            if !self.countries.iter().any(|c| &c.key == key) {
                return Err(ConfigError::Validation(format!(
                    "unknown country '{key}'"
                )));
            }
        }
        let countries = self
            .countries
            .into_iter()
            .filter(|c| keys.contains(&c.key))
            .collect();
        Ok(Self { countries })
    }
}

/// Load and validate the country table from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_countries(path: &Path) -> Result<CountryList, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let list: CountryList =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
            path: path.display().to_string(),
            source: e,
        })?;

    validate_countries(&list)?;

    Ok(list)
}

fn validate_countries(list: &CountryList) -> Result<(), ConfigError> {
    if list.countries.is_empty() {
        return Err(ConfigError::Validation(
            "at least one country must be configured".to_string(),
        ));
    }

    let mut seen_keys = HashSet::new();

    for country in &list.countries {
        let key_ok = !country.key.is_empty()
            && country
                .key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !key_ok {
            return Err(ConfigError::Validation(format!(
                "country key '{}' must be lowercase ascii letters, digits, '_' or '-'",
                country.key
            )));
        }

        if !seen_keys.insert(country.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate country key: '{}'",
                country.key
            )));
        }

        let template = &country.url_template;
        if !template.contains("{page}") {
            return Err(ConfigError::Validation(format!(
                "country '{}' url_template must contain {{page}}",
                country.key
            )));
        }
        if !template.contains("{query}") && !template.contains("{tag}") {
            return Err(ConfigError::Validation(format!(
                "country '{}' url_template must contain {{query}} or {{tag}}",
                country.key
            )));
        }

        if country.currency.len() != 3 || !country.currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(ConfigError::Validation(format!(
                "country '{}' currency '{}' is not an ISO 4217 code",
                country.key, country.currency
            )));
        }

        if country.capture_file.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "country '{}' capture_file must be non-empty",
                country.key
            )));
        }

        if country.capture.session_cookies.is_empty() {
            return Err(ConfigError::Validation(format!(
                "country '{}' must name at least one session cookie",
                country.key
            )));
        }
    }

    Ok(())
}

fn default_required_headers() -> Vec<String> {
    vec!["user-agent".to_string(), "referer".to_string()]
}

fn default_session_cookies() -> Vec<String> {
    vec!["lzd_sid".to_string(), "_m_h5_tk".to_string()]
}

fn default_auth_markers() -> Vec<String> {
    vec![
        "FAIL_SYS_USER_VALIDATE".to_string(),
        "RGV587_ERROR".to_string(),
    ]
}

#[cfg(test)]
#[path = "countries_test.rs"]
mod tests;
