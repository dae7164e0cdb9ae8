//! Runtime configuration for the validator and the batch runner.
//!
//! Everything here is immutable once a run starts. Components receive the
//! pieces they need at construction and share them across workers.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::validation::known_domains::DEFAULT_KNOWN_DOMAINS;
use crate::validation::smtp::{ProbeEndpoint, SecurityMode};

/// Settings consumed by [`Validator`](crate::pipeline::Validator) and its stages.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Public resolvers queried for MX records
    pub dns_servers: Vec<IpAddr>,
    /// Per-query DNS timeout
    pub dns_timeout: Duration,
    /// Upper bound on a whole MX lookup, retries included
    pub dns_lifetime: Duration,
    pub dns_attempts: usize,
    /// Socket timeout applied to every connect, read and TLS step
    pub smtp_timeout: Duration,
    /// Name announced in EHLO
    pub helo_name: String,
    /// Ports tried in order against each MX host
    pub probe_endpoints: Vec<ProbeEndpoint>,
    /// How many MX hosts are probed before giving up
    pub max_mx_hosts: usize,
    pub known_domains: Vec<String>,
    pub accept_invalid_certs: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            dns_servers: vec![
                IpAddr::from([8, 8, 8, 8]), // Google
                IpAddr::from([1, 1, 1, 1]), // Cloudflare
            ],
            dns_timeout: Duration::from_secs(5),
            dns_lifetime: Duration::from_secs(5),
            dns_attempts: 1,
            smtp_timeout: Duration::from_secs(5),
            helo_name: "localhost".to_string(),
            probe_endpoints: vec![
                ProbeEndpoint::new(25, SecurityMode::Plain),
                ProbeEndpoint::new(587, SecurityMode::OpportunisticStartTls),
                ProbeEndpoint::new(465, SecurityMode::ImplicitTls),
            ],
            max_mx_hosts: 2,
            known_domains: DEFAULT_KNOWN_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            accept_invalid_certs: false,
        }
    }
}

impl ValidatorConfig {
    /// Uses one timeout for DNS queries, the DNS lifetime and every socket step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self.dns_lifetime = timeout;
        self.smtp_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dns_servers.is_empty() {
            return Err(ConfigError::Zero("dns_servers"));
        }
        if self.dns_attempts == 0 {
            return Err(ConfigError::Zero("dns_attempts"));
        }
        if self.max_mx_hosts == 0 {
            return Err(ConfigError::Zero("max_mx_hosts"));
        }
        if self.probe_endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self.smtp_timeout.is_zero() {
            return Err(ConfigError::Zero("smtp_timeout"));
        }
        Ok(())
    }
}

/// Parses resolver addresses given as strings (CLI or environment).
pub fn parse_dns_servers<S: AsRef<str>>(servers: &[S]) -> Result<Vec<IpAddr>, ConfigError> {
    servers
        .iter()
        .map(|s| {
            let s = s.as_ref().trim();
            s.parse::<IpAddr>()
                .map_err(|_| ConfigError::DnsServer(s.to_string()))
        })
        .collect()
}

/// Settings consumed by [`BatchRunner`](crate::worker::BatchRunner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Addresses validated at the same time
    pub max_concurrency: usize,
    /// Completions between two checkpoint flushes
    pub checkpoint_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            checkpoint_interval: 100,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Zero("max_concurrency"));
        }
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::Zero("checkpoint_interval"));
        }
        Ok(())
    }
}
