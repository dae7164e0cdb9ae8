use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub known_domain: usize,
    /// Addresses that went through DNS and SMTP
    pub full_check: usize,
    /// Valid share of the total, in percent
    pub success_rate: f64,
    /// Wall-clock duration of the whole batch
    pub total_secs: f64,
    /// Wall-clock time divided by the number of addresses
    pub avg_ms_per_address: f64,
    /// Mean of the per-address elapsed times
    pub avg_validation_ms: f64,
    pub checkpoints: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Counters kept by the aggregation loop while a batch runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub processed: usize,
    pub valid: usize,
    pub known_domain: usize,
    pub full_check: usize,
    pub checkpoints: usize,
    pub elapsed_ms_sum: u64,
}

impl BatchSummary {
    pub fn new(
        total: usize,
        counters: &BatchCounters,
        wall_time: Duration,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let total_secs = wall_time.as_secs_f64();
        Self {
            total,
            valid: counters.valid,
            invalid: total.saturating_sub(counters.valid),
            known_domain: counters.known_domain,
            full_check: counters.full_check,
            success_rate: percent(counters.valid, total),
            total_secs,
            avg_ms_per_address: per_item(total_secs * 1000.0, total),
            avg_validation_ms: per_item(counters.elapsed_ms_sum as f64, counters.processed),
            checkpoints: counters.checkpoints,
            started_at,
            finished_at,
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn per_item(amount: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { amount / count as f64 }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "Validation finished:")?;
        writeln!(f, "- Total addresses:     {}", self.total)?;
        writeln!(f, "- Valid:               {}", self.valid)?;
        writeln!(f, "- Invalid:             {}", self.invalid)?;
        writeln!(f, "- Known domain:        {}", self.known_domain)?;
        writeln!(f, "- Full check:          {}", self.full_check)?;
        writeln!(f, "- Success rate:        {:.1}%", self.success_rate)?;
        writeln!(f, "- Total time:          {:.1}s", self.total_secs)?;
        writeln!(f, "- Average speed:       {:.1} ms/address", self.avg_ms_per_address)?;
        writeln!(f, "- Checkpoints written: {}", self.checkpoints)?;
        writeln!(f, "- Started:             {}", self.started_at.to_rfc3339())?;
        writeln!(f, "- Finished:            {}", self.finished_at.to_rfc3339())?;
        write!(f, "{rule}")
    }
}
