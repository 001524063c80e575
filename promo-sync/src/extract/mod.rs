//! Extraction of campaigns from the remote planning spreadsheet
//!
//! The spreadsheet is copied into the staging directory, read, its headers
//! renamed through the column map, and every row with readable dates turned
//! into a [`Campaign`](crate::model::Campaign).

pub mod remote;
pub mod rows;
pub mod sheet;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::{ColumnConfig, Config, RemoteConfig, StagingConfig};
use crate::error::{EtlError, Result};

pub use remote::{CopyOutput, MockRemoteCopy, Rclone, RemoteCopy};
pub use rows::{Extraction, campaigns_from_sheet};
pub use sheet::Sheet;

pub struct Extractor {
    remote: RemoteConfig,
    staging: StagingConfig,
    columns: ColumnConfig,
    copier: Arc<dyn RemoteCopy>,
}

impl Extractor {
    pub fn new(config: &Config, copier: Arc<dyn RemoteCopy>) -> Self {
        Self {
            remote: config.remote.clone(),
            staging: config.staging.clone(),
            columns: config.columns.clone(),
            copier,
        }
    }

    /// Extractor that copies through rclone as configured
    pub fn with_rclone(config: &Config) -> Self {
        Self::new(config, Arc::new(Rclone::from_config(&config.remote)))
    }

    /// Download the spreadsheet and build the campaigns it describes.
    ///
    /// Statuses are derived against `today`.
    pub async fn fetch(&self, today: NaiveDate) -> Result<Extraction> {
        tokio::fs::create_dir_all(&self.staging.dir).await?;
        let local_file = self.staging.file_path();
        let source_ref = self.remote.source_ref();

        log::info!("Downloading {} to {}", source_ref, local_file.display());
        let output = self.copier.copy_to(&self.remote, &local_file).await?;

        if !output.success() {
            log::error!("Copy of {} failed with status {}", source_ref, output.status);
            log::error!("stdout: {}", output.stdout.trim_end());
            log::error!("stderr: {}", output.stderr.trim_end());
            return Err(EtlError::Transfer {
                source_ref,
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        log::info!("Downloaded {}", local_file.display());

        let mut sheet = Sheet::read(&local_file)?;
        sheet.rename_columns(&self.columns.map);

        let extraction = campaigns_from_sheet(&sheet, &self.columns.year, today)?;

        if extraction.dropped_rows > 0 {
            log::warn!(
                "Dropped {} of {} rows with unreadable dates",
                extraction.dropped_rows,
                extraction.total_rows
            );
        }
        log::info!("Extracted {} campaigns", extraction.campaigns.len());

        Ok(extraction)
    }
}
