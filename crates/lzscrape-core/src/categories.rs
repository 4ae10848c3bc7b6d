use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A product taxonomy node scraped as one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Display name, also stored in the warehouse `category` column.
    pub name: String,
    /// Search phrase substituted into the listing URL.
    pub query: String,
}

impl CategoryConfig {
    /// File-name-safe form of the category name, used for backup files.
    ///
    /// `"Bath & Body, Care"` → `"bath_and_body_care"`.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .trim()
            .to_lowercase()
            .replace('&', "and")
            .chars()
            .filter_map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    Some(c)
                } else if c.is_whitespace() {
                    Some('_')
                } else {
                    None
                }
            })
            .collect::<String>()
            .split('_')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryList {
    pub categories: Vec<CategoryConfig>,
}

/// Load and validate the category list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_categories(path: &Path) -> Result<CategoryList, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let list: CategoryList =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
            path: path.display().to_string(),
            source: e,
        })?;

    validate_categories(&list)?;

    Ok(list)
}

fn validate_categories(list: &CategoryList) -> Result<(), ConfigError> {
    if list.categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one category must be configured".to_string(),
        ));
    }

    let mut seen_names = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for category in &list.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name must be non-empty".to_string(),
            ));
        }

        if category.query.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' has an empty query",
                category.name
            )));
        }

        if !seen_names.insert(category.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category name: '{}'",
                category.name
            )));
        }

        // Two names that collapse to one slug would share a backup file.
        let slug = category.slug();
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category slug: '{}' (from category '{}')",
                slug, category.name
            )));
        }
    }

    Ok(())
}
