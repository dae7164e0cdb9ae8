//! Where addresses come from and where results go.
//!
//! The batch runner reads every address once at start, writes each result
//! back to its row as it completes, and flushes at checkpoints. Only the
//! runner's aggregation loop talks to the store, so calls never overlap.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::ValidationResult;

pub mod csv_file;
pub mod memory;

pub use csv_file::CsvRecordStore;
pub use memory::MemoryRecordStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Raw address of every row, in row order.
    async fn load_addresses(&self) -> Result<Vec<String>, StoreError>;

    /// Records the result for `row`. Not durable until [`RecordStore::flush`].
    async fn write_result(&self, row: usize, result: &ValidationResult) -> Result<(), StoreError>;

    /// Persists everything written so far.
    async fn flush(&self) -> Result<(), StoreError>;
}
