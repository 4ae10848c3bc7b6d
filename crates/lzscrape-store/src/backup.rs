//! Local CSV backup, written before the warehouse upload.
//!
//! Layout: `<root>/<country>/<YYYY-MM-DD>/<category-slug>.csv`. Re-running a
//! category on the same day appends to the same file; the header row is only
//! written when the file is created.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lzscrape_core::ProductRecord;

use crate::StoreError;

#[derive(Debug, Clone)]
pub struct BackupWriter {
    root: PathBuf,
}

impl BackupWriter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, country: &str, date: NaiveDate, slug: &str) -> PathBuf {
        self.root
            .join(country)
            .join(date.format("%Y-%m-%d").to_string())
            .join(format!("{slug}.csv"))
    }

    /// Append `records` to the day's file for this category and fsync it.
    ///
    /// An empty batch touches nothing and returns the would-be path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BackupWrite`] if the directory cannot be
    /// created or the file cannot be written.
    pub fn append(
        &self,
        records: &[ProductRecord],
        country: &str,
        date: NaiveDate,
        slug: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.path_for(country, date, slug);
        if records.is_empty() {
            return Ok(path);
        }

        let io_err = |source: std::io::Error| StoreError::BackupWrite {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        let is_new = file.metadata().map_err(io_err)?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(Vec::new());
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| io_err(std::io::Error::other(e)))?;
        }
        let buf = writer
            .into_inner()
            .map_err(|e| io_err(std::io::Error::other(e.to_string())))?;

        file.write_all(&buf).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        tracing::debug!(
            path = %path.display(),
            rows = records.len(),
            header = is_new,
            "backup appended"
        );
        Ok(path)
    }
}

#[cfg(test)]
#[path = "backup_test.rs"]
mod tests;
