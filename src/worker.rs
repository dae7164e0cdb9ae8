use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::task::AbortHandle;
use tracing::{info, warn};

use crate::config::BatchConfig;
use crate::error::{ConfigError, Result, StoreError};
use crate::models::{BatchCounters, BatchSummary, ValidationPath, ValidationResult};
use crate::pipeline::Validator;
use crate::report;
use crate::store::RecordStore;
use crate::validation::syntax::normalize_address;

/// Cancels a spawned validation when the batch stops waiting for it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Validates every address of a record store with bounded concurrency.
///
/// At most `max_concurrency` pipelines run at once, each on its own task.
/// Results are consumed in completion order by a single loop that owns the
/// counters and is the only caller of the store.
pub struct BatchRunner {
    validator: Arc<Validator>,
    store: Arc<dyn RecordStore>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(
        validator: Arc<Validator>,
        store: Arc<dyn RecordStore>,
        config: BatchConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            validator,
            store,
            config,
        })
    }

    /// Runs the batch to completion.
    ///
    /// Fails only when the store cannot be read, written or flushed; a
    /// per-address problem always ends up in that address's result.
    pub async fn run(&self) -> Result<BatchSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let addresses = self.store.load_addresses().await?;
        let total = addresses.len();
        info!(
            total,
            workers = self.config.max_concurrency,
            checkpoint_interval = self.config.checkpoint_interval,
            "starting batch"
        );
        info!("{}", report::table_header());

        let mut counters = BatchCounters::default();
        let mut completions = stream::iter(addresses.into_iter().enumerate())
            .map(|(row, raw)| {
                let validator = self.validator.clone();
                async move {
                    let address = normalize_address(&raw);
                    let task = tokio::spawn(async move { validator.validate(&raw).await });
                    let _abort = AbortOnDrop(task.abort_handle());
                    let joined = task.await;
                    let result = joined.unwrap_or_else(|err| {
                        // The pipeline catches its own panics; this is a cancelled task
                        let path = if address.is_empty() {
                            ValidationPath::Empty
                        } else {
                            ValidationPath::FullCheck
                        };
                        ValidationResult::internal_error(address, path, &err.to_string())
                    });
                    (row, result)
                }
            })
            .buffer_unordered(self.config.max_concurrency);

        while let Some((row, result)) = completions.next().await {
            self.record(row, &result, &mut counters, total).await?;
        }

        if counters.processed % self.config.checkpoint_interval != 0 {
            self.checkpoint(&mut counters).await?;
        }

        let summary = BatchSummary::new(
            total,
            &counters,
            clock.elapsed(),
            started_at,
            Utc::now(),
        );
        info!(
            total,
            valid = summary.valid,
            checkpoints = summary.checkpoints,
            "batch finished"
        );
        Ok(summary)
    }

    async fn record(
        &self,
        row: usize,
        result: &ValidationResult,
        counters: &mut BatchCounters,
        total: usize,
    ) -> Result<()> {
        self.store
            .write_result(row, result)
            .await
            .inspect_err(|err| warn!(row, error = %err, "could not record result"))?;

        counters.processed += 1;
        counters.elapsed_ms_sum += result.elapsed_ms;
        if result.is_valid {
            counters.valid += 1;
        }
        match result.path {
            ValidationPath::KnownDomain => counters.known_domain += 1,
            ValidationPath::FullCheck => counters.full_check += 1,
            ValidationPath::Empty | ValidationPath::Malformed => {}
        }

        info!("{}", report::status_line(result));

        if counters.processed % self.config.checkpoint_interval == 0 {
            self.checkpoint(counters).await?;
            info!("{}", report::progress_line(counters.processed, total));
        }
        Ok(())
    }

    async fn checkpoint(&self, counters: &mut BatchCounters) -> std::result::Result<(), StoreError> {
        self.store
            .flush()
            .await
            .inspect_err(|err| warn!(error = %err, "checkpoint failed"))?;
        counters.checkpoints += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::Error;
    use crate::store::MemoryRecordStore;
    use crate::validation::dnsmx::{DnsError, MockMxLookup, MxLookup, MxRecord};
    use crate::validation::known_domains::KnownDomains;
    use crate::validation::smtp::{MailProbe, MockMailProbe, ProbeOutcome};

    /// DNS stand-in whose answer and delay depend on the domain, so
    /// completion order differs from submission order.
    struct ScriptedLookup;

    #[async_trait]
    impl MxLookup for ScriptedLookup {
        async fn lookup_mx(&self, domain: &str) -> std::result::Result<Vec<MxRecord>, DnsError> {
            let n: u64 = domain
                .trim_start_matches("host")
                .trim_end_matches(".test")
                .parse()
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis((n * 7) % 11)).await;
            if n % 5 == 0 {
                Err(DnsError::NxDomain)
            } else {
                Ok(vec![MxRecord::new(10, format!("mx.{domain}."))])
            }
        }
    }

    struct ScriptedProbe;

    #[async_trait]
    impl MailProbe for ScriptedProbe {
        async fn probe(&self, host: &str) -> ProbeOutcome {
            tokio::time::sleep(Duration::from_millis(host.len() as u64 % 3)).await;
            if host.contains('3') {
                ProbeOutcome::unreachable(vec!["port 25 connection refused".to_string()])
            } else {
                ProbeOutcome {
                    success: true,
                    detail: "connected on port 25".to_string(),
                    endpoint: None,
                }
            }
        }
    }

    fn scripted_validator() -> Arc<Validator> {
        Arc::new(Validator::with_components(
            KnownDomains::default(),
            Arc::new(ScriptedLookup),
            Arc::new(ScriptedProbe),
            2,
        ))
    }

    fn fifty_addresses() -> Vec<String> {
        (0..50)
            .map(|i| match i % 4 {
                0 => format!("user{i}@gmail.com"),
                1 => format!("not-an-address-{i}"),
                2 => String::new(),
                _ => format!("user{i}@host{i}.test"),
            })
            .collect()
    }

    async fn run_with(workers: usize, interval: usize) -> (BatchSummary, MemoryRecordStore) {
        let store = MemoryRecordStore::new(fifty_addresses());
        let config = BatchConfig {
            max_concurrency: workers,
            checkpoint_interval: interval,
        };
        let runner = BatchRunner::new(scripted_validator(), Arc::new(store.clone()), config).unwrap();
        let summary = runner.run().await.unwrap();
        (summary, store)
    }

    fn without_timing(results: Vec<Option<ValidationResult>>) -> Vec<ValidationResult> {
        results
            .into_iter()
            .map(|r| r.expect("every row gets a result").with_elapsed(Duration::ZERO))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_results() {
        let (serial, serial_store) = run_with(1, 7).await;
        let (parallel, parallel_store) = run_with(10, 7).await;

        assert_eq!(
            without_timing(serial_store.results().await),
            without_timing(parallel_store.results().await)
        );
        assert_eq!(serial.valid, parallel.valid);
        assert_eq!(serial.known_domain, parallel.known_domain);
        assert_eq!(serial.full_check, parallel.full_check);

        // ceil(50 / 7) = 8
        assert_eq!(serial_store.flush_count().await, 8);
        assert_eq!(parallel_store.flush_count().await, 8);
        assert_eq!(parallel.checkpoints, 8);
    }

    #[tokio::test]
    async fn test_counts_by_path() {
        let (summary, store) = run_with(4, 100).await;

        assert_eq!(summary.total, 50);
        assert_eq!(summary.known_domain, 13);
        assert_eq!(summary.full_check, 12);
        assert_eq!(summary.valid + summary.invalid, 50);

        let results = without_timing(store.results().await);
        let by_path: HashMap<ValidationPath, usize> =
            results.iter().fold(HashMap::new(), |mut acc, r| {
                *acc.entry(r.path).or_default() += 1;
                acc
            });
        assert_eq!(by_path[&ValidationPath::Empty], 12);
        assert_eq!(by_path[&ValidationPath::Malformed], 13);
        for result in &results {
            let expected = result.path == ValidationPath::KnownDomain
                || (result.has_mx && result.smtp_valid);
            assert_eq!(result.is_valid, expected, "{}", result.address);
        }
    }

    #[tokio::test]
    async fn test_flush_on_exact_multiple_is_not_repeated() {
        let (summary, store) = run_with(3, 10).await;
        assert_eq!(store.flush_count().await, 5);
        assert_eq!(summary.checkpoints, 5);
    }

    #[tokio::test]
    async fn test_empty_and_known_domain() {
        let mut lookup = MockMxLookup::new();
        lookup.expect_lookup_mx().times(0);
        let mut probe = MockMailProbe::new();
        probe.expect_probe().times(0);
        let validator = Arc::new(Validator::with_components(
            KnownDomains::default(),
            Arc::new(lookup),
            Arc::new(probe),
            2,
        ));

        let store = MemoryRecordStore::new(["", "user@gmail.com"]);
        let runner =
            BatchRunner::new(validator, Arc::new(store.clone()), BatchConfig::default()).unwrap();
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.valid, 1);
        assert_eq!(summary.known_domain, 1);
        assert_eq!(summary.checkpoints, 1);

        let results = without_timing(store.results().await);
        assert_eq!(results[0].path, ValidationPath::Empty);
        assert!(!results[0].is_valid);
        assert_eq!(results[1].path, ValidationPath::KnownDomain);
        assert!(results[1].is_valid);
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let store = MemoryRecordStore::new(Vec::<String>::new());
        let runner =
            BatchRunner::new(scripted_validator(), Arc::new(store.clone()), BatchConfig::default())
                .unwrap();
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.checkpoints, 0);
        assert_eq!(store.flush_count().await, 0);
    }

    #[tokio::test]
    async fn test_flush_failure_is_fatal() {
        let store = MemoryRecordStore::new(["user@gmail.com"]);
        store.fail_flushes().await;
        let runner =
            BatchRunner::new(scripted_validator(), Arc::new(store), BatchConfig::default())
                .unwrap();

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Io { .. })));
    }

    /// Counts probes that ran to completion.
    struct SlowProbe {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MailProbe for SlowProbe {
        async fn probe(&self, _host: &str) -> ProbeOutcome {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            ProbeOutcome::unreachable(vec!["port 25 timed out".to_string()])
        }
    }

    #[tokio::test]
    async fn test_aborted_batch_cancels_pending_validations() {
        let mut lookup = MockMxLookup::new();
        lookup
            .expect_lookup_mx()
            .returning(|_| Ok(vec![MxRecord::new(10, "mx.slow.test.")]));
        let finished = Arc::new(AtomicUsize::new(0));
        let validator = Arc::new(Validator::with_components(
            KnownDomains::default(),
            Arc::new(lookup),
            Arc::new(SlowProbe {
                finished: finished.clone(),
            }),
            2,
        ));

        let store = MemoryRecordStore::new([
            "user@gmail.com",
            "a@slow.test",
            "b@slow.test",
            "c@slow.test",
        ]);
        store.fail_flushes().await;
        let config = BatchConfig {
            max_concurrency: 4,
            checkpoint_interval: 1,
        };
        let runner = BatchRunner::new(validator, Arc::new(store), config).unwrap();
        assert!(runner.run().await.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let store = MemoryRecordStore::new(Vec::<String>::new());
        let config = BatchConfig {
            max_concurrency: 0,
            checkpoint_interval: 100,
        };
        let result = BatchRunner::new(scripted_validator(), Arc::new(store), config);
        assert!(matches!(result, Err(ConfigError::Zero("max_concurrency"))));
    }
}
