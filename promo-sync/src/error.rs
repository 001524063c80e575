//! Error taxonomy for a sync run
//!
//! Every variant is fatal: the run stops and nothing is committed. Rows with
//! unparseable dates are not errors, they are counted in
//! [`Extraction::dropped_rows`](crate::extract::Extraction).

use thiserror::Error;

use crate::load::Phase;

#[derive(Debug, Error)]
pub enum EtlError {
    /// The remote copy tool exited with a non-zero status
    #[error("remote copy of '{source_ref}' failed with status {status}")]
    Transfer {
        source_ref: String,
        status: i32,
        stdout: String,
        stderr: String,
    },

    /// Input or configuration does not have the shape the job needs
    #[error("validation failed: {0}")]
    Validation(String),

    /// Connecting to or preparing the database failed, outside the load
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A statement failed inside the load transaction (already rolled back)
    #[error("load failed during {phase}: {source}")]
    Transaction {
        phase: Phase,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to open workbook: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EtlError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
