use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RecordStore;
use crate::error::StoreError;
use crate::models::ValidationResult;

/// In-memory record store.
///
/// Nothing is persisted; flushes are only counted. Useful for tests and for
/// embedding the runner where results are consumed directly.
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Debug)]
struct MemoryState {
    addresses: Vec<String>,
    results: Vec<Option<ValidationResult>>,
    flushes: usize,
    fail_flush: bool,
}

impl MemoryRecordStore {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let addresses: Vec<String> = addresses.into_iter().map(Into::into).collect();
        let results = vec![None; addresses.len()];
        Self {
            inner: Arc::new(RwLock::new(MemoryState {
                addresses,
                results,
                flushes: 0,
                fail_flush: false,
            })),
        }
    }

    /// Makes every subsequent flush fail, as a full disk would.
    pub async fn fail_flushes(&self) {
        self.inner.write().await.fail_flush = true;
    }

    pub async fn flush_count(&self) -> usize {
        self.inner.read().await.flushes
    }

    /// Results by row; `None` for rows not written yet.
    pub async fn results(&self) -> Vec<Option<ValidationResult>> {
        self.inner.read().await.results.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.addresses.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.addresses.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load_addresses(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.read().await.addresses.clone())
    }

    async fn write_result(&self, row: usize, result: &ValidationResult) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let len = guard.results.len();
        let slot = guard
            .results
            .get_mut(row)
            .ok_or(StoreError::RowOutOfRange { row, len })?;
        *slot = Some(result.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if guard.fail_flush {
            return Err(StoreError::io(
                "<memory>",
                std::io::Error::other("flush disabled"),
            ));
        }
        guard.flushes += 1;
        Ok(())
    }
}
