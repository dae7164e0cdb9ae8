pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod validation;
pub mod worker;

pub use config::{BatchConfig, ValidatorConfig};
pub use error::{ConfigError, Error, Result, StoreError};
pub use models::{BatchSummary, ValidationPath, ValidationResult};
pub use pipeline::Validator;
pub use store::{CsvRecordStore, MemoryRecordStore, RecordStore};
pub use worker::BatchRunner;
