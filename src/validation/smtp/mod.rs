//! Mail server reachability probe.
//!
//! A probe walks an ordered list of ports against one MX host and stops at
//! the first one where an SMTP greeting and EHLO complete. No mail is sent.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::ConfigError;

pub mod handshake;
pub mod session;
pub mod tls;

pub use handshake::SmtpHandshake;

/// How the connection on a given port is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityMode {
    /// Plain SMTP, no upgrade attempted
    Plain,
    /// Plain SMTP, STARTTLS tried when offered; failure is tolerated
    OpportunisticStartTls,
    /// TLS from the first byte (submissions, port 465)
    ImplicitTls,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityMode::Plain => write!(f, "plain"),
            SecurityMode::OpportunisticStartTls => write!(f, "starttls"),
            SecurityMode::ImplicitTls => write!(f, "tls"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeEndpoint {
    pub port: u16,
    pub mode: SecurityMode,
}

impl ProbeEndpoint {
    pub const fn new(port: u16, mode: SecurityMode) -> Self {
        Self { port, mode }
    }
}

/// Coarse failure category reported for each port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    Refused,
    Tls,
    Other,
}

/// Why a single port failed to complete a handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("timed out")]
    Timeout,

    #[error("connection refused")]
    Refused,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("error: {0}")]
    Other(String),
}

impl HandshakeError {
    pub fn class(&self) -> FailureClass {
        match self {
            HandshakeError::Timeout => FailureClass::Timeout,
            HandshakeError::Refused => FailureClass::Refused,
            HandshakeError::Tls(_) => FailureClass::Tls,
            HandshakeError::Other(_) => FailureClass::Other,
        }
    }
}

impl From<std::io::Error> for HandshakeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => HandshakeError::Refused,
            std::io::ErrorKind::TimedOut => HandshakeError::Timeout,
            _ => HandshakeError::Other(err.to_string()),
        }
    }
}

/// What happened to the security upgrade on a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeStatus {
    /// Plain port, nothing to upgrade
    NotAttempted,
    /// Connection was TLS from the start
    Implicit,
    Upgraded,
    NotOffered,
    Failed(String),
}

/// Result of probing one MX host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Human-readable summary; on failure every port's reason joined by `" | "`
    pub detail: String,
    /// The endpoint that completed the handshake
    pub endpoint: Option<ProbeEndpoint>,
}

impl ProbeOutcome {
    pub fn reachable(endpoint: ProbeEndpoint, upgrade: &UpgradeStatus) -> Self {
        let detail = match upgrade {
            UpgradeStatus::NotAttempted => format!("connected on port {}", endpoint.port),
            UpgradeStatus::Implicit => format!("TLS connection on port {}", endpoint.port),
            UpgradeStatus::Upgraded => {
                format!("connected on port {} (STARTTLS)", endpoint.port)
            }
            UpgradeStatus::NotOffered => {
                format!("connected on port {} (STARTTLS not offered)", endpoint.port)
            }
            UpgradeStatus::Failed(reason) => {
                format!(
                    "connected on port {} (STARTTLS failed: {})",
                    endpoint.port, reason
                )
            }
        };
        Self {
            success: true,
            detail,
            endpoint: Some(endpoint),
        }
    }

    pub fn unreachable(reasons: Vec<String>) -> Self {
        Self {
            success: false,
            detail: reasons.join(" | "),
            endpoint: None,
        }
    }
}

/// Per-port handshake. Separated from the port iteration so each step can be
/// exercised on its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Handshake: Send + Sync {
    async fn handshake(
        &self,
        host: &str,
        endpoint: ProbeEndpoint,
    ) -> Result<UpgradeStatus, HandshakeError>;
}

/// Reachability check for a single MX host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailProbe: Send + Sync {
    async fn probe(&self, host: &str) -> ProbeOutcome;
}

/// Tries each configured endpoint in order and returns on the first success.
#[derive(Clone)]
pub struct SmtpProbe {
    endpoints: Arc<[ProbeEndpoint]>,
    handshake: Arc<dyn Handshake>,
}

impl SmtpProbe {
    pub fn new(config: &ValidatorConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_handshake(
            config.probe_endpoints.clone(),
            Arc::new(SmtpHandshake::new(config)?),
        ))
    }

    pub fn with_handshake(endpoints: Vec<ProbeEndpoint>, handshake: Arc<dyn Handshake>) -> Self {
        Self {
            endpoints: endpoints.into(),
            handshake,
        }
    }
}

#[async_trait]
impl MailProbe for SmtpProbe {
    async fn probe(&self, host: &str) -> ProbeOutcome {
        let mut reasons = Vec::with_capacity(self.endpoints.len());

        for &endpoint in self.endpoints.iter() {
            match self.handshake.handshake(host, endpoint).await {
                Ok(upgrade) => {
                    debug!(host, port = endpoint.port, ?upgrade, "handshake completed");
                    return ProbeOutcome::reachable(endpoint, &upgrade);
                }
                Err(err) => {
                    debug!(
                        host,
                        port = endpoint.port,
                        class = ?err.class(),
                        error = %err,
                        "handshake failed"
                    );
                    reasons.push(format!("port {} {}", endpoint.port, err));
                }
            }
        }

        ProbeOutcome::unreachable(reasons)
    }
}
