//! Console lines emitted while a batch runs.

use crate::models::ValidationResult;

const ADDRESS_WIDTH: usize = 30;
const RULE_WIDTH: usize = 60;
/// MX hosts shown per address; the rest stay in the output file.
const MX_SHOWN: usize = 3;

pub fn table_header() -> String {
    format!(
        "{:<30} {:<10} {:<6} {:<6} {:<6}\n{}",
        "Address",
        "Result",
        "MX",
        "SMTP",
        "ms",
        "-".repeat(RULE_WIDTH)
    )
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

/// One status row plus indented detail lines.
///
/// ```text
/// user@example.org               ✓ valid    ✓      ✓      412
///     type: full-check
///     MX servers: mx1.example.org, mx2.example.org
///     SMTP details: connected on port 25
/// ```
pub fn status_line(result: &ValidationResult) -> String {
    let address: String = result.address.chars().take(ADDRESS_WIDTH).collect();
    let verdict = if result.is_valid { "✓ valid" } else { "✗ invalid" };
    let mut line = format!(
        "{:<30} {:<10} {:<6} {:<6} {:<6}",
        address,
        verdict,
        mark(result.has_mx),
        mark(result.smtp_valid),
        result.elapsed_ms
    );

    let mx = if result.mx_records.is_empty() {
        "N/A".to_string()
    } else {
        result
            .mx_records
            .iter()
            .take(MX_SHOWN)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    line.push_str(&format!("\n    type: {}", result.path));
    line.push_str(&format!("\n    MX servers: {mx}"));
    if !result.smtp_details.is_empty() {
        line.push_str(&format!("\n    SMTP details: {}", result.smtp_details));
    }
    if !result.error_message.is_empty() {
        line.push_str(&format!("\n    error: {}", result.error_message));
    }
    line
}

pub fn progress_line(processed: usize, total: usize) -> String {
    let pct = if total == 0 {
        100.0
    } else {
        processed as f64 * 100.0 / total as f64
    };
    let rule = "-".repeat(RULE_WIDTH);
    format!("{rule}\nProgress: {processed}/{total} ({pct:.1}%)\n{rule}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_truncates_address() {
        let long = format!("{}@example.org", "a".repeat(40));
        let line = status_line(&ValidationResult::malformed(long));
        let first = line.lines().next().unwrap();
        assert!(first.starts_with(&"a".repeat(30)));
        assert!(!first.starts_with(&"a".repeat(31)));
        assert!(line.contains("error: invalid format"));
        assert!(line.contains("MX servers: N/A"));
    }

    #[test]
    fn test_status_line_shows_three_mx_hosts() {
        let result = ValidationResult::reachable(
            "user@example.org",
            vec!["mx1".into(), "mx2".into(), "mx3".into(), "mx4".into()],
            "connected on port 25".into(),
        );
        let line = status_line(&result);
        assert!(line.contains("MX servers: mx1, mx2, mx3\n"));
        assert!(!line.contains("mx4"));
        assert!(line.contains("SMTP details: connected on port 25"));
        assert!(!line.contains("error:"));
    }

    #[test]
    fn test_progress_line() {
        assert!(progress_line(100, 400).contains("Progress: 100/400 (25.0%)"));
        assert!(progress_line(0, 0).contains("(100.0%)"));
    }
}
