/// # Per-Address Validation Result
///
/// The record produced by the pipeline for every input row, whatever the
/// outcome. Immutable once built; the batch runner only reads it.
///
/// ## Example JSON
/// ```json
/// {
///   "address": "user@example.com",
///   "is_valid": true,
///   "has_mx": true,
///   "smtp_valid": true,
///   "mx_records": ["mx1.example.com", "mx2.example.com"],
///   "error_message": "",
///   "smtp_details": "connected on port 25",
///   "elapsed_ms": 412,
///   "path": "full-check"
/// }
/// ```
pub mod result;

/// # Batch Summary
///
/// Aggregate counters and timings reported once a batch has finished.
pub mod summary;

pub use result::{RESULT_COLUMNS, ValidationPath, ValidationResult};
pub use summary::{BatchCounters, BatchSummary};
