use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use email_checker::config::parse_dns_servers;
use email_checker::store::csv_file::DEFAULT_ADDRESS_COLUMN;
use email_checker::{
    BatchConfig, BatchRunner, ConfigError, CsvRecordStore, Validator, ValidatorConfig,
};
use tracing_subscriber::EnvFilter;

/// Bulk email address checker.
///
/// Reads addresses from a CSV column, checks syntax, MX records and SMTP
/// reachability, and writes the verdict columns back into the same file,
/// checkpointing as it goes. No mail is ever sent.
#[derive(Parser, Debug)]
#[command(name = "email-check", version)]
struct Cli {
    /// CSV file to validate in place
    input: PathBuf,

    /// Column holding the addresses
    #[arg(long, env = "EMAIL_CHECK_COLUMN", default_value = DEFAULT_ADDRESS_COLUMN)]
    column: String,

    /// Addresses validated concurrently
    #[arg(short, long, env = "EMAIL_CHECK_WORKERS", default_value_t = 10)]
    workers: usize,

    /// Completions between two checkpoint writes
    #[arg(long, env = "EMAIL_CHECK_CHECKPOINT_INTERVAL", default_value_t = 100)]
    checkpoint_interval: usize,

    /// DNS and socket timeout in seconds
    #[arg(short, long, env = "EMAIL_CHECK_TIMEOUT", default_value_t = 5)]
    timeout: u64,

    /// DNS server to query (repeatable); defaults to 8.8.8.8 and 1.1.1.1
    #[arg(long = "dns-server", env = "EMAIL_CHECK_DNS_SERVERS", value_delimiter = ',')]
    dns_servers: Vec<String>,

    /// Extra domain accepted without network checks (repeatable)
    #[arg(long = "known-domain", env = "EMAIL_CHECK_KNOWN_DOMAINS", value_delimiter = ',')]
    known_domains: Vec<String>,

    /// Skip certificate verification on TLS ports
    #[arg(long, env = "EMAIL_CHECK_ACCEPT_INVALID_CERTS")]
    accept_invalid_certs: bool,

    /// Also write the final summary as JSON
    #[arg(long, env = "EMAIL_CHECK_SUMMARY_JSON")]
    summary_json: Option<PathBuf>,

    /// Log every probe step
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn validator_config(&self) -> Result<ValidatorConfig, ConfigError> {
        let mut config = ValidatorConfig::default().with_timeout(Duration::from_secs(self.timeout));
        if !self.dns_servers.is_empty() {
            config.dns_servers = parse_dns_servers(&self.dns_servers)?;
        }
        config.known_domains.extend(self.known_domains.iter().cloned());
        config.accept_invalid_certs = self.accept_invalid_certs;
        Ok(config)
    }

    fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_concurrency: self.workers,
            checkpoint_interval: self.checkpoint_interval,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "email_checker=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let validator = cli
        .validator_config()
        .and_then(|config| Validator::from_config(&config))
        .context("invalid validator configuration")?;
    let store = CsvRecordStore::open(&cli.input, &cli.column)
        .await
        .with_context(|| format!("failed to open {}", cli.input.display()))?;

    let runner = BatchRunner::new(Arc::new(validator), Arc::new(store), cli.batch_config())
        .context("invalid batch configuration")?;
    let summary = runner.run().await.context("batch aborted")?;

    println!("{summary}");
    println!("Results saved to: {}", cli.input.display());

    if let Some(path) = &cli.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}
