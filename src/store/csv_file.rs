//! CSV file record store.
//!
//! The whole table is held in memory. Result columns are added to the header
//! when missing and overwritten per row. Every flush writes the table to a
//! sibling temp file and renames it over the original, so a crash mid-write
//! leaves the previous checkpoint intact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::RecordStore;
use crate::error::StoreError;
use crate::models::{RESULT_COLUMNS, ValidationResult};

/// Address column used when none is configured.
pub const DEFAULT_ADDRESS_COLUMN: &str = "email";

#[derive(Debug)]
pub struct CsvRecordStore {
    path: PathBuf,
    table: Arc<RwLock<Table>>,
}

#[derive(Debug)]
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    address_column: usize,
    /// Position of each entry of [`RESULT_COLUMNS`] in `headers`
    result_columns: [usize; RESULT_COLUMNS.len()],
}

impl CsvRecordStore {
    /// Loads `path` and locates `column`.
    ///
    /// A missing file or a header without `column` is an error; the batch
    /// cannot start without its input.
    pub async fn open<P: AsRef<Path>>(path: P, column: &str) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path)
            .await
            .map_err(|e| StoreError::io(path.display().to_string(), e))?;

        let table = Table::parse(&bytes, column)?;
        debug!(
            path = %path.display(),
            rows = table.rows.len(),
            column,
            "loaded address table"
        );

        Ok(Self {
            path,
            table: Arc::new(RwLock::new(table)),
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Table {
    fn parse(bytes: &[u8], column: &str) -> Result<Self, StoreError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let mut headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if let Some(first) = headers.first_mut() {
            // Spreadsheet exports often start with a UTF-8 BOM
            *first = first.trim_start_matches('\u{feff}').to_string();
        }

        let address_column = headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| StoreError::MissingColumn(column.to_string()))?;

        // Cells past the input header are dropped before result columns exist
        let input_width = headers.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            row.resize(input_width, String::new());
            rows.push(row);
        }

        let mut result_columns = [0; RESULT_COLUMNS.len()];
        for (slot, name) in result_columns.iter_mut().zip(RESULT_COLUMNS) {
            *slot = match headers.iter().position(|h| h == name) {
                Some(idx) => idx,
                None => {
                    headers.push(name.to_string());
                    headers.len() - 1
                }
            };
        }

        let width = headers.len();
        for row in &mut rows {
            row.resize(width, String::new());
        }

        Ok(Self {
            headers,
            rows,
            address_column,
            result_columns,
        })
    }

    fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| StoreError::io("<csv buffer>", e.into_error()))
    }
}

#[async_trait]
impl RecordStore for CsvRecordStore {
    async fn load_addresses(&self) -> Result<Vec<String>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .iter()
            .map(|row| row[table.address_column].clone())
            .collect())
    }

    async fn write_result(&self, row: usize, result: &ValidationResult) -> Result<(), StoreError> {
        let mut guard = self.table.write().await;
        let table = &mut *guard;
        let len = table.rows.len();
        let cells = table
            .rows
            .get_mut(row)
            .ok_or(StoreError::RowOutOfRange { row, len })?;

        for (idx, value) in table.result_columns.iter().zip(result.column_values()) {
            cells[*idx] = value;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let bytes = self.table.read().await.to_bytes()?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| StoreError::io(temp_path.display().to_string(), e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StoreError::io(self.path.display().to_string(), e))?;

        trace!(path = %self.path.display(), bytes = bytes.len(), "checkpoint written");
        Ok(())
    }
}
