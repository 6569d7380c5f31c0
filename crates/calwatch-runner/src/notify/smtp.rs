//! SMTP delivery.
//!
//! A small client that speaks just enough ESMTP to hand one message to a
//! submission server: greeting, EHLO, optional STARTTLS, AUTH PLAIN,
//! envelope, DATA, QUIT. Port 587 uses STARTTLS; every other port expects
//! TLS from the first byte.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use calwatch_providers::BoxFuture;
use chrono::Utc;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use super::{Notification, Notifier};
use crate::error::{RunnerError, RunnerResult};

const BASE64_LINE_WIDTH: usize = 76;

/// Raw bytes per RFC 2047 encoded word, keeping each word under 75 chars.
const ENCODED_WORD_BYTES: usize = 45;

/// How the connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain connect, then upgrade with STARTTLS.
    StartTls,
    /// TLS handshake immediately after connect.
    Implicit,
}

impl TlsMode {
    pub fn for_port(port: u16) -> Self {
        if port == SmtpConfig::STARTTLS_PORT {
            Self::StartTls
        } else {
            Self::Implicit
        }
    }
}

/// Mail server settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Login name; AUTH is skipped when empty.
    pub username: String,
    pub password: String,
    /// Envelope sender and `From` address.
    pub sender_email: String,
    /// Display name for the `From` header.
    pub sender_name: Option<String>,
    pub verify_certificates: bool,
    /// Upper bound for the whole session.
    pub timeout: Duration,
}

impl SmtpConfig {
    pub const STARTTLS_PORT: u16 = 587;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    pub fn new(host: impl Into<String>, port: u16, sender_email: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            sender_email: sender_email.into(),
            sender_name: None,
            verify_certificates: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tls_mode(&self) -> TlsMode {
        TlsMode::for_port(self.port)
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("verify_certificates", &self.verify_certificates)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends notifications as multipart mail.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    fn build_tls_connector(&self) -> RunnerResult<TlsConnector> {
        let mut builder = native_tls::TlsConnector::builder();
        if !self.config.verify_certificates {
            warn!(host = %self.config.host, "TLS certificate verification disabled for SMTP");
            builder.danger_accept_invalid_certs(true);
        }
        builder.min_protocol_version(Some(native_tls::Protocol::Tlsv12));

        let connector = builder
            .build()
            .map_err(|e| RunnerError::Connection(format!("TLS builder failed: {e}")))?;
        Ok(TlsConnector::from(connector))
    }

    #[instrument(skip_all, fields(host = %self.config.host, port = self.config.port))]
    async fn deliver_notification(&self, notification: &Notification) -> RunnerResult<()> {
        if notification.recipients.is_empty() {
            return Err(RunnerError::delivery("no recipients configured"));
        }

        let message_id = format!(
            "<{}.{}@{}>",
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            domain_of(&self.config.sender_email)
        );
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S +0000").to_string();
        let boundary = format!("calwatch-{}", Uuid::new_v4().simple());
        let content = build_message(&self.config, notification, &message_id, &date, &boundary);

        tokio::time::timeout(
            self.config.timeout,
            self.send_smtp(&notification.recipients, &content),
        )
        .await
        .map_err(|_| {
            RunnerError::Connection(format!(
                "timed out after {}s",
                self.config.timeout.as_secs()
            ))
        })??;

        info!(
            recipients = notification.recipients.len(),
            message_id = %message_id,
            "Sent notification mail"
        );
        Ok(())
    }

    async fn send_smtp(&self, recipients: &[String], content: &str) -> RunnerResult<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| RunnerError::Connection(format!("{addr}: {e}")))?;
        let tls = self.build_tls_connector()?;

        match self.config.tls_mode() {
            TlsMode::Implicit => {
                debug!("Using implicit TLS");
                let stream = tls
                    .connect(&self.config.host, stream)
                    .await
                    .map_err(|e| RunnerError::Connection(format!("TLS handshake failed: {e}")))?;
                deliver(stream, &self.config, recipients, content).await
            }
            TlsMode::StartTls => {
                debug!("Using STARTTLS");
                let mut session = SmtpSession::new(stream);
                session.expect_reply(&[220]).await?;
                session
                    .command(&format!("EHLO {}", local_hostname()), &[250])
                    .await?;
                session.command("STARTTLS", &[220]).await?;

                let stream = tls
                    .connect(&self.config.host, session.into_inner())
                    .await
                    .map_err(|e| {
                        RunnerError::Connection(format!("STARTTLS upgrade failed: {e}"))
                    })?;
                let mut session = SmtpSession::new(stream);
                send_mail(&mut session, &self.config, recipients, content).await
            }
        }
    }
}

impl Notifier for SmtpNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, RunnerResult<()>> {
        Box::pin(self.deliver_notification(notification))
    }
}

/// Builds the RFC 5322 message with text and HTML alternatives.
fn build_message(
    config: &SmtpConfig,
    notification: &Notification,
    message_id: &str,
    date: &str,
    boundary: &str,
) -> String {
    let from = match config.sender_name.as_deref() {
        Some(name) if !name.is_empty() => {
            format!("{} <{}>", display_name(name), config.sender_email)
        }
        _ => config.sender_email.clone(),
    };
    let text = notification.text_body.replace("\r\n", "\n").replace('\n', "\r\n");

    let mut message = String::new();
    message.push_str(&format!("From: {from}\r\n"));
    message.push_str(&format!("To: {}\r\n", notification.recipients.join(", ")));
    message.push_str(&format!("Subject: {}\r\n", encode_header(&notification.subject)));
    message.push_str(&format!("Date: {date}\r\n"));
    message.push_str(&format!("Message-ID: {message_id}\r\n"));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str(&format!(
        "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\r\n"
    ));

    let parts = [
        ("text/plain", text.as_str()),
        ("text/html", notification.html_body.as_str()),
    ];
    for (mime, body) in parts {
        message.push_str(&format!("--{boundary}\r\n"));
        message.push_str(&format!("Content-Type: {mime}; charset=utf-8\r\n"));
        message.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        message.push_str(&encode_base64_lines(body.as_bytes()));
        message.push_str("\r\n");
    }
    message.push_str(&format!("--{boundary}--\r\n"));
    message
}

fn encode_base64_lines(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH * 2);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % BASE64_LINE_WIDTH == 0 {
            out.push_str("\r\n");
        }
        out.push(c);
    }
    out
}

/// Encodes a header value as RFC 2047 words when it is not plain ASCII.
fn encode_header(value: &str) -> String {
    let value: String = value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();
    if value.is_ascii() {
        return value;
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if !chunk.is_empty() && chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
    }
    words.join("\r\n ")
}

fn display_name(name: &str) -> String {
    if name.is_ascii() {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        encode_header(name)
    }
}

fn domain_of(email: &str) -> &str {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
        .unwrap_or("calwatch.local")
}

fn local_hostname() -> String {
    hostname::get().map_or_else(
        |_| "localhost".to_string(),
        |h| h.to_string_lossy().to_string(),
    )
}

/// A complete server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

struct SmtpSession<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Returns the underlying stream. Must only be called between replies.
    fn into_inner(self) -> S {
        self.reader.into_inner().unsplit(self.writer)
    }

    async fn send_command(&mut self, command: &str) -> RunnerResult<()> {
        trace!(command = %command.split(' ').next().unwrap_or(command), "Sending SMTP command");
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .map_err(|e| RunnerError::Smtp(format!("Failed to send command: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| RunnerError::Smtp(format!("Failed to send command: {e}")))
    }

    async fn read_reply(&mut self) -> RunnerResult<Reply> {
        let mut text = String::new();
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| RunnerError::Smtp(format!("Failed to read reply: {e}")))?;
            if read == 0 {
                return Err(RunnerError::Connection(
                    "server closed the connection".to_string(),
                ));
            }

            trace!(line = %line.trim_end(), "SMTP reply");
            text.push_str(&line);
            if line.len() < 4 || line.as_bytes()[3] != b'-' {
                break;
            }
        }

        let code = text
            .get(..3)
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| RunnerError::Smtp(format!("Malformed reply: {}", text.trim_end())))?;
        Ok(Reply {
            code,
            text: text.trim_end().to_string(),
        })
    }

    async fn expect_reply(&mut self, codes: &[u16]) -> RunnerResult<Reply> {
        let reply = self.read_reply().await?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(RunnerError::Smtp(format!(
                "Expected {:?}, got: {}",
                codes, reply.text
            )))
        }
    }

    async fn command(&mut self, command: &str, codes: &[u16]) -> RunnerResult<Reply> {
        self.send_command(command).await?;
        self.expect_reply(codes).await
    }

    /// Writes the message body with dot-stuffing and the terminating dot line.
    async fn write_data(&mut self, content: &str) -> RunnerResult<()> {
        let mut data = content.replace("\r\n.", "\r\n..");
        if data.starts_with('.') {
            data.insert(0, '.');
        }
        if !data.ends_with("\r\n") {
            data.push_str("\r\n");
        }
        data.push_str(".\r\n");

        self.writer
            .write_all(data.as_bytes())
            .await
            .map_err(|e| RunnerError::Smtp(format!("Failed to send content: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| RunnerError::Smtp(format!("Failed to send content: {e}")))
    }
}

/// Runs a full session on an already secured stream, starting at the greeting.
async fn deliver<S>(
    stream: S,
    config: &SmtpConfig,
    recipients: &[String],
    content: &str,
) -> RunnerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = SmtpSession::new(stream);
    session.expect_reply(&[220]).await?;
    send_mail(&mut session, config, recipients, content).await
}

/// EHLO, AUTH, envelope and DATA. The greeting has already been consumed.
async fn send_mail<S>(
    session: &mut SmtpSession<S>,
    config: &SmtpConfig,
    recipients: &[String],
    content: &str,
) -> RunnerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session
        .command(&format!("EHLO {}", local_hostname()), &[250])
        .await?;

    if config.username.is_empty() {
        debug!("No SMTP username, skipping AUTH");
    } else {
        let auth = STANDARD.encode(format!("\0{}\0{}", config.username, config.password));
        session.send_command(&format!("AUTH PLAIN {auth}")).await?;
        let reply = session.read_reply().await?;
        if reply.code != 235 {
            return Err(RunnerError::Authentication(reply.text));
        }
    }

    session
        .command(&format!("MAIL FROM:<{}>", config.sender_email), &[250])
        .await?;
    for recipient in recipients {
        session
            .command(&format!("RCPT TO:<{recipient}>"), &[250, 251])
            .await?;
    }

    session.command("DATA", &[354]).await?;
    session.write_data(content).await?;
    session.expect_reply(&[250]).await?;

    // Servers may close right after QUIT.
    session.send_command("QUIT").await?;
    Ok(())
}
