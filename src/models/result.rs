use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which stage settled the verdict.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationPath {
    Empty,
    Malformed,
    KnownDomain,
    FullCheck,
}

impl ValidationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPath::Empty => "empty",
            ValidationPath::Malformed => "malformed",
            ValidationPath::KnownDomain => "known-domain",
            ValidationPath::FullCheck => "full-check",
        }
    }

    /// Whether the address got past the syntax stage.
    pub fn valid_format(&self) -> bool {
        matches!(self, ValidationPath::KnownDomain | ValidationPath::FullCheck)
    }
}

impl fmt::Display for ValidationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Trimmed, lowercased input
    pub address: String,
    pub is_valid: bool,
    pub has_mx: bool,
    pub smtp_valid: bool,
    /// MX hostnames, lowest preference first
    pub mx_records: Vec<String>,
    /// Empty when nothing went wrong
    pub error_message: String,
    pub smtp_details: String,
    pub elapsed_ms: u64,
    pub path: ValidationPath,
}

impl ValidationResult {
    fn rejected(address: String, path: ValidationPath, error: &str) -> Self {
        Self {
            address,
            is_valid: false,
            has_mx: false,
            smtp_valid: false,
            mx_records: Vec::new(),
            error_message: error.to_string(),
            smtp_details: String::new(),
            elapsed_ms: 0,
            path,
        }
    }

    pub fn empty() -> Self {
        Self::rejected(String::new(), ValidationPath::Empty, "empty address")
    }

    pub fn malformed(address: impl Into<String>) -> Self {
        Self::rejected(address.into(), ValidationPath::Malformed, "invalid format")
    }

    /// Accepted on the known-provider fast path; no network was used.
    pub fn known_domain(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            is_valid: true,
            has_mx: true,
            smtp_valid: true,
            mx_records: Vec::new(),
            error_message: String::new(),
            smtp_details: String::new(),
            elapsed_ms: 0,
            path: ValidationPath::KnownDomain,
        }
    }

    pub fn no_mx(address: impl Into<String>) -> Self {
        Self::rejected(address.into(), ValidationPath::FullCheck, "no MX records")
    }

    /// An MX host completed the handshake.
    pub fn reachable(address: impl Into<String>, mx_records: Vec<String>, details: String) -> Self {
        Self {
            address: address.into(),
            is_valid: true,
            has_mx: true,
            smtp_valid: true,
            mx_records,
            error_message: String::new(),
            smtp_details: details,
            elapsed_ms: 0,
            path: ValidationPath::FullCheck,
        }
    }

    /// MX hosts exist but none of the probed ones answered.
    pub fn unreachable(
        address: impl Into<String>,
        mx_records: Vec<String>,
        details: String,
    ) -> Self {
        Self {
            address: address.into(),
            is_valid: false,
            has_mx: true,
            smtp_valid: false,
            mx_records,
            error_message: format!("SMTP verification failed: {details}"),
            smtp_details: details,
            elapsed_ms: 0,
            path: ValidationPath::FullCheck,
        }
    }

    /// A stage panicked. `path` is the last stage that was entered.
    pub fn internal_error(address: impl Into<String>, path: ValidationPath, reason: &str) -> Self {
        let mut result = Self::rejected(address.into(), path, "");
        result.error_message = format!("validation error: {reason}");
        result
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn valid_format(&self) -> bool {
        self.path.valid_format()
    }

    /// Values for the result columns, in [`RESULT_COLUMNS`] order.
    pub fn column_values(&self) -> [String; 8] {
        [
            self.valid_format().to_string(),
            self.has_mx.to_string(),
            self.smtp_valid.to_string(),
            self.mx_records.join(";"),
            self.error_message.clone(),
            self.smtp_details.clone(),
            self.elapsed_ms.to_string(),
            self.path.to_string(),
        ]
    }
}

/// Columns appended to every output row.
pub const RESULT_COLUMNS: [&str; 8] = [
    "valid_format",
    "has_mx",
    "smtp_valid",
    "mx_servers",
    "error_message",
    "smtp_details",
    "validation_time_ms",
    "validation_type",
];
