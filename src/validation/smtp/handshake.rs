use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use super::session::{SmtpSession, bounded};
use super::tls::TlsClient;
use super::{Handshake, HandshakeError, ProbeEndpoint, SecurityMode, UpgradeStatus};
use crate::config::ValidatorConfig;
use crate::error::ConfigError;

/// Real-socket [`Handshake`].
///
/// Each attempt walks `Idle → Connecting → Greeted | Failed`, then for
/// opportunistic ports an optional upgrade, and always ends with QUIT and a
/// dropped connection. Every step is bounded by the socket timeout.
#[derive(Clone)]
pub struct SmtpHandshake {
    tls: TlsClient,
    helo_name: String,
    timeout: Duration,
}

impl SmtpHandshake {
    pub fn new(config: &ValidatorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tls: TlsClient::new(config.accept_invalid_certs)?,
            helo_name: config.helo_name.clone(),
            timeout: config.smtp_timeout,
        })
    }

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, HandshakeError> {
        bounded(self.timeout, async {
            TcpStream::connect((host, port))
                .await
                .map_err(HandshakeError::from)
        })
        .await
    }

    /// Greeting plus EHLO on an already-established stream.
    async fn greet<S>(&self, stream: S) -> Result<(SmtpSession<S>, bool), HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut session = SmtpSession::new(stream, self.timeout);
        session.greeting().await?;
        let ehlo = session.ehlo(&self.helo_name).await?;
        Ok((session, ehlo.advertises("STARTTLS")))
    }

    /// Attempts STARTTLS on a greeted session. The handshake has already
    /// succeeded at this point, so every outcome is reported rather than
    /// raised.
    async fn upgrade(&self, host: &str, mut session: SmtpSession<TcpStream>) -> UpgradeStatus {
        if let Err(err) = session.starttls().await {
            session.quit().await;
            return UpgradeStatus::Failed(err.to_string());
        }

        let tls = match bounded(self.timeout, self.tls.connect(host, session.into_inner())).await {
            Ok(tls) => tls,
            Err(err) => return UpgradeStatus::Failed(err.to_string()),
        };

        let mut session = SmtpSession::new(tls, self.timeout);
        match session.ehlo(&self.helo_name).await {
            Ok(_) => {
                session.quit().await;
                UpgradeStatus::Upgraded
            }
            Err(err) => UpgradeStatus::Failed(err.to_string()),
        }
    }
}

#[async_trait]
impl Handshake for SmtpHandshake {
    async fn handshake(
        &self,
        host: &str,
        endpoint: ProbeEndpoint,
    ) -> Result<UpgradeStatus, HandshakeError> {
        debug!(host, port = endpoint.port, mode = %endpoint.mode, "connecting");
        let tcp = self.connect(host, endpoint.port).await?;

        match endpoint.mode {
            SecurityMode::Plain => {
                let (session, _) = self.greet(tcp).await?;
                session.quit().await;
                Ok(UpgradeStatus::NotAttempted)
            }
            SecurityMode::ImplicitTls => {
                let tls = bounded(self.timeout, self.tls.connect(host, tcp)).await?;
                let (session, _) = self.greet(tls).await?;
                session.quit().await;
                Ok(UpgradeStatus::Implicit)
            }
            SecurityMode::OpportunisticStartTls => {
                let (session, offers_tls) = self.greet(tcp).await?;
                if !offers_tls {
                    session.quit().await;
                    return Ok(UpgradeStatus::NotOffered);
                }
                Ok(self.upgrade(host, session).await)
            }
        }
    }
}
