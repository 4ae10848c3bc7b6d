//! Warehouse key file (`key.json`), handed out by the operator contact.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// Service-account style key file granting access to the warehouse.
///
/// Only `database_url` is required to connect; the remaining fields identify
/// the account in logs.
#[derive(Clone, Deserialize)]
pub struct WarehouseCredentials {
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    pub database_url: String,
    /// Postgres schema holding the `products` table. Defaults to `public`.
    #[serde(default)]
    pub dataset: Option<String>,
}

impl WarehouseCredentials {
    /// Label for log lines: client email, else project id, else `"unknown"`.
    #[must_use]
    pub fn account_label(&self) -> &str {
        self.client_email
            .as_deref()
            .or(self.project_id.as_deref())
            .unwrap_or("unknown")
    }
}

impl fmt::Debug for WarehouseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCredentials")
            .field("account_type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("database_url", &"[redacted]")
            .field("dataset", &self.dataset)
            .finish()
    }
}

/// Read the key file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredentialFile`] when the file does not exist,
/// [`ConfigError::FileIo`] for other read failures, and
/// [`ConfigError::CredentialParse`] when the JSON is malformed or lacks
/// `database_url`.
pub fn load_credentials(path: &Path) -> Result<WarehouseCredentials, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingCredentialFile {
                path: path.display().to_string(),
            });
        }
        Err(e) => {
            return Err(ConfigError::FileIo {
                path: path.display().to_string(),
                source: e,
            });
        }
    };

    let credentials: WarehouseCredentials =
        serde_json::from_str(&content).map_err(|e| ConfigError::CredentialParse {
            path: path.display().to_string(),
            source: e,
        })?;

    if credentials.database_url.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "credential file {} has an empty database_url",
            path.display()
        )));
    }

    Ok(credentials)
}
