//! Backup-then-upload persistence for one category batch.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use lzscrape_core::ProductRecord;

use crate::backup::BackupWriter;
use crate::warehouse::Warehouse;
use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub backup_path: PathBuf,
    pub backed_up: usize,
    pub uploaded: u64,
    /// Set when the warehouse rejected the batch. The backup still holds it.
    pub warehouse_error: Option<String>,
}

#[derive(Clone)]
pub struct PersistenceSink {
    backup: BackupWriter,
    warehouse: Arc<dyn Warehouse>,
}

impl std::fmt::Debug for PersistenceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceSink")
            .field("backup", &self.backup)
            .finish_non_exhaustive()
    }
}

impl PersistenceSink {
    #[must_use]
    pub fn new(backup: BackupWriter, warehouse: Arc<dyn Warehouse>) -> Self {
        Self { backup, warehouse }
    }

    #[must_use]
    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// Write the batch to the CSV backup, then upsert it into the warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BackupWrite`] if the backup cannot be written.
    /// The warehouse is not touched in that case. A warehouse failure is not
    /// an error; it is logged and returned in [`SinkReport::warehouse_error`].
    pub async fn write(
        &self,
        records: &[ProductRecord],
        country: &str,
        date: NaiveDate,
        slug: &str,
    ) -> Result<SinkReport, StoreError> {
        let backup_path = self.backup.append(records, country, date, slug)?;

        if records.is_empty() {
            return Ok(SinkReport {
                backup_path,
                backed_up: 0,
                uploaded: 0,
                warehouse_error: None,
            });
        }

        let (uploaded, warehouse_error) = match self.warehouse.upsert(records).await {
            Ok(n) => (n, None),
            Err(e) => {
                tracing::warn!(
                    country,
                    category = slug,
                    rows = records.len(),
                    backup = %backup_path.display(),
                    error = %e,
                    "warehouse upload failed; rows kept in backup"
                );
                (0, Some(e.to_string()))
            }
        };

        Ok(SinkReport {
            backup_path,
            backed_up: records.len(),
            uploaded,
            warehouse_error,
        })
    }
}
