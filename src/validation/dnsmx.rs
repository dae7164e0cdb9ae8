use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    proto::op::ResponseCode,
};

use crate::config::ValidatorConfig;

/// One MX answer as returned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    /// Lower value = higher priority
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Why a domain produced no usable MX hosts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("domain does not exist")]
    NxDomain,

    #[error("no MX records published")]
    NoRecords,

    #[error("DNS query timed out")]
    Timeout,

    #[error("DNS lookup failed: {0}")]
    Lookup(String),
}

impl From<ResolveError> for DnsError {
    fn from(err: ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. }
                if *response_code == ResponseCode::NXDomain =>
            {
                DnsError::NxDomain
            }
            ResolveErrorKind::NoRecordsFound { .. } => DnsError::NoRecords,
            ResolveErrorKind::Timeout => DnsError::Timeout,
            _ => DnsError::Lookup(err.to_string()),
        }
    }
}

/// Raw MX query against some DNS backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MxLookup: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError>;
}

/// Result of resolving a domain's mail exchangers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MxResolution {
    /// Hostnames in priority order, never empty
    Found(Vec<String>),
    NotFound(DnsError),
}

impl MxResolution {
    pub fn has_mx(&self) -> bool {
        matches!(self, MxResolution::Found(_))
    }

    pub fn hosts(&self) -> &[String] {
        match self {
            MxResolution::Found(hosts) => hosts,
            MxResolution::NotFound(_) => &[],
        }
    }
}

/// Sorts records by preference, then hostname, and strips the root dot.
///
/// A null MX (`.`, RFC 7505) means the domain accepts no mail and is dropped.
pub fn order_mx_records(mut records: Vec<MxRecord>) -> Vec<String> {
    for record in &mut records {
        record.exchange = record.exchange.trim_end_matches('.').to_lowercase();
    }
    records.sort_by(|a, b| {
        a.preference
            .cmp(&b.preference)
            .then_with(|| a.exchange.cmp(&b.exchange))
    });
    records
        .into_iter()
        .map(|r| r.exchange)
        .filter(|host| !host.is_empty())
        .collect()
}

/// Resolves a domain into an ordered MX host list.
///
/// Every failure is folded into [`MxResolution::NotFound`]; nothing is
/// returned as an error.
#[derive(Clone)]
pub struct DomainResolver {
    lookup: Arc<dyn MxLookup>,
}

impl DomainResolver {
    pub fn new(lookup: Arc<dyn MxLookup>) -> Self {
        Self { lookup }
    }

    pub async fn resolve(&self, domain: &str) -> MxResolution {
        match self.lookup.lookup_mx(domain).await {
            Ok(records) => {
                let hosts = order_mx_records(records);
                if hosts.is_empty() {
                    debug!(domain, "MX answer held no usable hosts");
                    MxResolution::NotFound(DnsError::NoRecords)
                } else {
                    debug!(domain, ?hosts, "MX hosts resolved");
                    MxResolution::Found(hosts)
                }
            }
            Err(err) => {
                debug!(domain, error = %err, "MX lookup failed");
                MxResolution::NotFound(err)
            }
        }
    }
}

/// [`MxLookup`] backed by an async trust-dns resolver.
///
/// Configured with:
/// - the fixed public name servers from [`ValidatorConfig::dns_servers`]
/// - a per-query timeout and attempt count
/// - an overall lifetime enforced around the whole lookup
pub struct TrustDnsLookup {
    resolver: TokioAsyncResolver,
    lifetime: Duration,
}

impl TrustDnsLookup {
    pub fn new(config: &ValidatorConfig) -> Self {
        let name_servers = NameServerConfigGroup::from_ips_clear(&config.dns_servers, 53, true);
        let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);

        let mut opts = ResolverOpts::default();
        opts.timeout = config.dns_timeout;
        opts.attempts = config.dns_attempts;

        Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
            lifetime: config.dns_lifetime,
        }
    }
}

#[async_trait]
impl MxLookup for TrustDnsLookup {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        // Fully qualified so no search domain is appended.
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        let lookup = tokio::time::timeout(self.lifetime, self.resolver.mx_lookup(fqdn))
            .await
            .map_err(|_| DnsError::Timeout)??;

        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_string()))
            .collect())
    }
}
