//! Per-address validation: syntax, known domain, MX resolution, SMTP probe.
//!
//! Stages run in that order and the first one that settles the verdict ends
//! the run. Whatever happens, exactly one [`ValidationResult`] comes out.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::ValidatorConfig;
use crate::error::ConfigError;
use crate::models::{ValidationPath, ValidationResult};
use crate::validation::dnsmx::{DomainResolver, MxLookup, MxResolution, TrustDnsLookup};
use crate::validation::known_domains::KnownDomains;
use crate::validation::smtp::{MailProbe, SmtpProbe};
use crate::validation::syntax::{SyntaxChecker, SyntaxVerdict, normalize_address};

/// Shared by every worker of a batch; holds no per-address state.
pub struct Validator {
    syntax: SyntaxChecker,
    known_domains: KnownDomains,
    resolver: DomainResolver,
    probe: Arc<dyn MailProbe>,
    max_mx_hosts: usize,
}

impl Validator {
    /// Builds the production pipeline: trust-dns lookups and real sockets.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_components(
            KnownDomains::new(&config.known_domains),
            Arc::new(TrustDnsLookup::new(config)),
            Arc::new(SmtpProbe::new(config)?),
            config.max_mx_hosts,
        ))
    }

    pub fn with_components(
        known_domains: KnownDomains,
        lookup: Arc<dyn MxLookup>,
        probe: Arc<dyn MailProbe>,
        max_mx_hosts: usize,
    ) -> Self {
        Self {
            syntax: SyntaxChecker::new(),
            known_domains,
            resolver: DomainResolver::new(lookup),
            probe,
            max_mx_hosts,
        }
    }

    /// Validates one raw address. Never fails: panics inside a stage are
    /// caught and reported in the result's error message.
    pub async fn validate(&self, raw: &str) -> ValidationResult {
        let started = Instant::now();
        let address = normalize_address(raw);
        let mut reached = ValidationPath::Empty;

        let staged = AssertUnwindSafe(self.run_stages(&address, &mut reached))
            .catch_unwind()
            .await;

        let result = match staged {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(%address, stage = %reached, %reason, "validation stage panicked");
                ValidationResult::internal_error(address, reached, &reason)
            }
        };
        result.with_elapsed(started.elapsed())
    }

    async fn run_stages(&self, address: &str, reached: &mut ValidationPath) -> ValidationResult {
        let domain = match self.syntax.check(address) {
            SyntaxVerdict::Empty => return ValidationResult::empty(),
            SyntaxVerdict::Malformed => {
                *reached = ValidationPath::Malformed;
                return ValidationResult::malformed(address);
            }
            SyntaxVerdict::WellFormed { domain, .. } => domain,
        };

        if self.known_domains.contains(&domain) {
            *reached = ValidationPath::KnownDomain;
            return ValidationResult::known_domain(address);
        }

        *reached = ValidationPath::FullCheck;
        let hosts = match self.resolver.resolve(&domain).await {
            MxResolution::Found(hosts) => hosts,
            MxResolution::NotFound(err) => {
                debug!(address, %domain, error = %err, "no MX hosts");
                return ValidationResult::no_mx(address);
            }
        };

        let mut failures = Vec::new();
        for host in hosts.iter().take(self.max_mx_hosts) {
            let outcome = self.probe.probe(host).await;
            if outcome.success {
                return ValidationResult::reachable(address, hosts.clone(), outcome.detail);
            }
            failures.push(format!("{host}: {}", outcome.detail));
        }

        ValidationResult::unreachable(address, hosts, failures.join(" || "))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::validation::dnsmx::{DnsError, MockMxLookup, MxRecord};
    use crate::validation::smtp::{MockMailProbe, ProbeOutcome};

    fn validator(lookup: MockMxLookup, probe: MockMailProbe) -> Validator {
        Validator::with_components(KnownDomains::default(), Arc::new(lookup), Arc::new(probe), 2)
    }

    fn untouched() -> (MockMxLookup, MockMailProbe) {
        let mut lookup = MockMxLookup::new();
        lookup.expect_lookup_mx().times(0);
        let mut probe = MockMailProbe::new();
        probe.expect_probe().times(0);
        (lookup, probe)
    }

    #[tokio::test]
    async fn test_malformed_makes_no_network_calls() {
        let (lookup, probe) = untouched();
        let validator = validator(lookup, probe);

        for raw in ["no-at-sign", "user@localhost", "user@example.c", "a b@example.com"] {
            let result = validator.validate(raw).await;
            assert_eq!(result.path, ValidationPath::Malformed, "{raw}");
            assert_eq!(result.error_message, "invalid format");
            assert!(!result.is_valid);
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (lookup, probe) = untouched();
        let result = validator(lookup, probe).validate("   ").await;

        assert_eq!(result.path, ValidationPath::Empty);
        assert_eq!(result.error_message, "empty address");
        assert_eq!(result.address, "");
    }

    #[tokio::test]
    async fn test_known_domain_skips_network() {
        let (lookup, probe) = untouched();
        let result = validator(lookup, probe).validate("  Someone@GMAIL.com ").await;

        assert_eq!(result.address, "someone@gmail.com");
        assert_eq!(result.path, ValidationPath::KnownDomain);
        assert!(result.is_valid);
        assert!(result.has_mx);
        assert!(result.smtp_valid);
        assert!(result.error_message.is_empty());
    }

    #[tokio::test]
    async fn test_known_domain_is_idempotent() {
        let (lookup, probe) = untouched();
        let validator = validator(lookup, probe);

        let first = validator.validate("user@qq.com").await;
        let second = validator.validate("user@qq.com").await;
        assert!(first.is_valid);
        assert_eq!(
            first.with_elapsed(Duration::ZERO),
            second.with_elapsed(Duration::ZERO)
        );
    }

    #[tokio::test]
    async fn test_no_mx_records() {
        let mut lookup = MockMxLookup::new();
        lookup
            .expect_lookup_mx()
            .withf(|domain| domain == "nomail.example")
            .times(1)
            .returning(|_| Ok(Vec::new()));
        let mut probe = MockMailProbe::new();
        probe.expect_probe().times(0);

        let result = validator(lookup, probe).validate("user@nomail.example").await;
        assert_eq!(result.path, ValidationPath::FullCheck);
        assert!(!result.has_mx);
        assert!(!result.smtp_valid);
        assert!(!result.is_valid);
        assert!(result.error_message.contains("MX"));
    }

    #[tokio::test]
    async fn test_nxdomain_is_no_mx() {
        let mut lookup = MockMxLookup::new();
        lookup
            .expect_lookup_mx()
            .returning(|_| Err(DnsError::NxDomain));
        let mut probe = MockMailProbe::new();
        probe.expect_probe().times(0);

        let result = validator(lookup, probe).validate("user@gone.example").await;
        assert_eq!(result.error_message, "no MX records");
    }

    #[tokio::test]
    async fn test_all_ports_refused() {
        let mut lookup = MockMxLookup::new();
        lookup
            .expect_lookup_mx()
            .returning(|_| Ok(vec![MxRecord::new(10, "mx.example.org.")]));
        let mut probe = MockMailProbe::new();
        probe.expect_probe().times(1).returning(|_| {
            ProbeOutcome::unreachable(vec![
                "port 25 connection refused".to_string(),
                "port 587 connection refused".to_string(),
                "port 465 connection refused".to_string(),
            ])
        });

        let result = validator(lookup, probe).validate("user@example.org").await;
        assert!(result.has_mx);
        assert!(!result.smtp_valid);
        assert!(!result.is_valid);
        assert_eq!(result.mx_records, vec!["mx.example.org"]);
        for port in ["25", "587", "465"] {
            assert!(result.smtp_details.contains(&format!("port {port} connection refused")));
        }
        assert!(result.error_message.starts_with("SMTP verification failed: mx.example.org: "));
    }

    #[tokio::test]
    async fn test_second_mx_host_succeeds() {
        let mut lookup = MockMxLookup::new();
        lookup.expect_lookup_mx().returning(|_| {
            Ok(vec![
                MxRecord::new(20, "backup.example.org."),
                MxRecord::new(10, "primary.example.org."),
            ])
        });
        let mut probe = MockMailProbe::new();
        probe
            .expect_probe()
            .withf(|host| host == "primary.example.org")
            .times(1)
            .returning(|_| ProbeOutcome::unreachable(vec!["port 25 timed out".to_string()]));
        probe
            .expect_probe()
            .withf(|host| host == "backup.example.org")
            .times(1)
            .returning(|_| ProbeOutcome {
                success: true,
                detail: "connected on port 25".to_string(),
                endpoint: None,
            });

        let result = validator(lookup, probe).validate("user@example.org").await;
        assert!(result.is_valid);
        assert_eq!(result.smtp_details, "connected on port 25");
        assert_eq!(result.mx_records, vec!["primary.example.org", "backup.example.org"]);
    }

    #[tokio::test]
    async fn test_only_first_two_hosts_are_probed() {
        let mut lookup = MockMxLookup::new();
        lookup.expect_lookup_mx().returning(|_| {
            Ok(vec![
                MxRecord::new(10, "mx1.example.org"),
                MxRecord::new(20, "mx2.example.org"),
                MxRecord::new(30, "mx3.example.org"),
            ])
        });
        let mut probe = MockMailProbe::new();
        probe
            .expect_probe()
            .withf(|host| host != "mx3.example.org")
            .times(2)
            .returning(|_| ProbeOutcome::unreachable(vec!["port 25 timed out".to_string()]));

        let result = validator(lookup, probe).validate("user@example.org").await;
        assert_eq!(result.mx_records.len(), 3);
        assert_eq!(
            result.smtp_details,
            "mx1.example.org: port 25 timed out || mx2.example.org: port 25 timed out"
        );
    }

    struct ExplodingLookup;

    #[async_trait]
    impl MxLookup for ExplodingLookup {
        async fn lookup_mx(&self, _domain: &str) -> Result<Vec<MxRecord>, DnsError> {
            panic!("resolver exploded")
        }
    }

    #[tokio::test]
    async fn test_panicking_stage_is_folded_into_result() {
        let mut probe = MockMailProbe::new();
        probe.expect_probe().times(0);
        let validator = Validator::with_components(
            KnownDomains::default(),
            Arc::new(ExplodingLookup),
            Arc::new(probe),
            2,
        );

        let result = validator.validate("user@example.org").await;
        assert_eq!(result.path, ValidationPath::FullCheck);
        assert!(!result.is_valid);
        assert_eq!(result.error_message, "validation error: resolver exploded");
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = ValidatorConfig {
            max_mx_hosts: 0,
            ..Default::default()
        };
        assert!(matches!(
            Validator::from_config(&config),
            Err(ConfigError::Zero("max_mx_hosts"))
        ));
    }
}
