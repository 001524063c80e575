//! Rebuilds the promo campaign workflow tables from the planning spreadsheet.
//!
//! A run is two steps: [`extract::Extractor`] copies and reads the
//! spreadsheet, [`load::Loader`] replaces the campaign, step and sub-step
//! tables in one transaction.

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod model;

use chrono::NaiveDate;

pub use config::Config;
pub use error::{EtlError, Result};
pub use extract::{Extraction, Extractor};
pub use load::{LoadReport, Loader};

/// Outcome of a complete run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub extraction: Extraction,
    pub load: LoadReport,
}

/// Extract then load, both against the same `today`
pub async fn run(extractor: &Extractor, loader: &Loader, today: NaiveDate) -> Result<RunSummary> {
    let extraction = extractor.fetch(today).await?;
    let load = loader.load(&extraction.campaigns, today).await?;
    Ok(RunSummary { extraction, load })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MockRemoteCopy;
    use crate::load::Phase;
    use rust_xlsxwriter::Workbook;
    use sqlx::postgres::PgPoolOptions;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    /// Loader on a port nothing listens on; the pool connects on first use
    fn unreachable_loader(config: &Config) -> Loader {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy("postgres://promo@127.0.0.1:1/promo")
            .unwrap();
        Loader::new(pool, config)
    }

    fn write_workbook(path: &Path) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = [
            "Année",
            "N°BCP",
            "CATALOGUES / COLLECTIONS",
            "OUVERTURE ENGAGEMENT",
            "FERMETURE ENGAGEMENT niveau magasin",
            "Clôture GAME \nEnvoi Supply",
        ];
        let row = ["2024", "0501", "Juin", "2024-06-01", "2024-06-30", "2024-05-20"];
        for (col, (name, value)) in header.iter().zip(row).enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
            sheet.write_string(1, col as u16, value).unwrap();
        }
        workbook.save(path).unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_before_load_when_copy_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.staging.dir = tmp.path().join("staging");

        let copier = MockRemoteCopy::failing(3, "", "directory not found");
        let extractor = Extractor::new(&config, Arc::new(copier.clone()));
        let loader = unreachable_loader(&config);

        match run(&extractor, &loader, today()).await {
            Err(EtlError::Transfer { status, stderr, .. }) => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "directory not found");
            }
            other => panic!("expected transfer error, got {:?}", other),
        }
        assert_eq!(copier.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_run_passes_load_failure_up() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = tmp.path().join("remote.xlsx");
        write_workbook(&fixture);

        let mut config = Config::default();
        config.staging.dir = tmp.path().join("staging");

        let copier = MockRemoteCopy::serving(&fixture);
        let extractor = Extractor::new(&config, Arc::new(copier.clone()));
        let loader = unreachable_loader(&config);

        match run(&extractor, &loader, today()).await {
            Err(EtlError::Transaction { phase, .. }) => assert_eq!(phase, Phase::Begin),
            other => panic!("expected transaction error, got {:?}", other),
        }
        assert!(config.staging.file_path().exists());
        assert_eq!(copier.calls().len(), 1);
    }
}
