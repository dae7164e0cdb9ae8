//! Minimal SMTP client dialogue: greeting, EHLO, STARTTLS, QUIT.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use super::HandshakeError;

/// Hostile servers could stream continuation lines forever.
const MAX_REPLY_LINES: usize = 64;
/// RFC 5321 caps reply lines at 512 octets; allow some slack.
const MAX_LINE_BYTES: usize = 1024;

/// Runs `fut` under `limit`, mapping expiry to [`HandshakeError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, HandshakeError>
where
    F: Future<Output = Result<T, HandshakeError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| HandshakeError::Timeout)?
}

/// A complete, possibly multi-line, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Whether an EHLO reply lists `keyword` among its extensions.
    pub fn advertises(&self, keyword: &str) -> bool {
        self.lines.iter().skip(1).any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(keyword))
        })
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lines.first() {
            Some(text) if !text.is_empty() => write!(f, "{} {}", self.code, text),
            _ => write!(f, "{}", self.code),
        }
    }
}

/// Splits `250-PIPELINING` into (250, false, "PIPELINING").
fn parse_reply_line(line: &str) -> Option<(u16, bool, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let code = line.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code = code.parse().ok()?;
    match line.as_bytes().get(3) {
        None => Some((code, true, "")),
        Some(b' ') => Some((code, true, &line[4..])),
        Some(b'-') => Some((code, false, &line[4..])),
        Some(_) => None,
    }
}

/// One SMTP conversation over any byte stream, plain or TLS.
pub struct SmtpSession<S> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    pub async fn read_reply(&mut self) -> Result<Reply, HandshakeError> {
        let limit = self.timeout;
        bounded(limit, self.read_reply_unbounded()).await
    }

    /// Sends one command line and waits for its reply.
    pub async fn command(&mut self, line: &str) -> Result<Reply, HandshakeError> {
        let limit = self.timeout;
        bounded(limit, self.send_line(line)).await?;
        self.read_reply().await
    }

    async fn read_reply_unbounded(&mut self) -> Result<Reply, HandshakeError> {
        let mut lines = Vec::new();
        loop {
            let buf = self.read_line_capped().await?;
            let (code, last, text) = parse_reply_line(&buf).ok_or_else(|| {
                HandshakeError::Other(format!("malformed reply: {}", buf.trim_end()))
            })?;
            lines.push(text.to_string());
            if last {
                return Ok(Reply { code, lines });
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(HandshakeError::Other("reply too long".to_string()));
            }
        }
    }

    /// Reads one line, refusing to buffer more than [`MAX_LINE_BYTES`].
    async fn read_line_capped(&mut self) -> Result<String, HandshakeError> {
        let mut raw = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut raw)
            .await?;
        if read == 0 {
            return Err(HandshakeError::Other(
                "connection closed by server".to_string(),
            ));
        }
        if raw.len() > MAX_LINE_BYTES {
            return Err(HandshakeError::Other("reply line too long".to_string()));
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), HandshakeError> {
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(())
    }

    /// Reads the banner; anything but 220 ends the handshake.
    pub async fn greeting(&mut self) -> Result<Reply, HandshakeError> {
        let reply = self.read_reply().await?;
        if reply.code != 220 {
            return Err(HandshakeError::Other(format!("unexpected greeting: {reply}")));
        }
        Ok(reply)
    }

    pub async fn ehlo(&mut self, helo_name: &str) -> Result<Reply, HandshakeError> {
        let reply = self.command(&format!("EHLO {helo_name}")).await?;
        if !reply.is_positive() {
            return Err(HandshakeError::Other(format!("EHLO rejected: {reply}")));
        }
        Ok(reply)
    }

    /// Asks for a TLS upgrade. On success the caller takes the raw stream
    /// back with [`SmtpSession::into_inner`] and wraps it.
    pub async fn starttls(&mut self) -> Result<(), HandshakeError> {
        let reply = self.command("STARTTLS").await?;
        if reply.code != 220 {
            return Err(HandshakeError::Tls(format!("STARTTLS refused: {reply}")));
        }
        Ok(())
    }

    /// Best-effort goodbye; the verdict is already known.
    pub async fn quit(mut self) {
        let _ = self.command("QUIT").await;
        let _ = self.stream.get_mut().shutdown().await;
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}
