//! Error types for the email checker.
//!
//! Only batch-level failures live here. Per-address problems never become
//! errors: they are folded into a [`ValidationResult`](crate::models::ValidationResult).

use thiserror::Error;

/// Result type alias for batch-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a [`RecordStore`](crate::store::RecordStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The table could not be parsed or serialized.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The address column is missing from the header row.
    #[error("Column '{0}' not found in input")]
    MissingColumn(String),

    /// A result was written for a row the store does not hold.
    #[error("Row {row} out of range (store holds {len} rows)")]
    RowOutOfRange { row: usize, len: usize },
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid tunables, caught before a batch starts.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Invalid DNS server address: {0}")]
    DnsServer(String),

    #[error("At least one probe endpoint is required")]
    NoEndpoints,

    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Top-level error for a batch run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
