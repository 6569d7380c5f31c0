//! Change notification delivery.
//!
//! - [`SmtpNotifier`] - mails the overview (multipart text + HTML)
//! - [`FileNotifier`] - writes the HTML body to a timestamped file
//! - [`StdoutNotifier`] - prints the text body, used for dry runs

mod file;
mod smtp;

pub use file::FileNotifier;
pub use smtp::{SmtpConfig, SmtpNotifier, TlsMode};

use calwatch_providers::BoxFuture;
use tokio::io::AsyncWriteExt;

use crate::error::{RunnerError, RunnerResult};

/// A rendered overview ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub recipients: Vec<String>,
}

/// Delivers notifications.
pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, RunnerResult<()>>;
}

/// Prints the subject and text body to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier;

impl StdoutNotifier {
    fn format(notification: &Notification) -> String {
        format!(
            "Subject: {}\nTo: {}\n\n{}\n",
            notification.subject,
            notification.recipients.join(", "),
            notification.text_body.trim_end()
        )
    }
}

impl Notifier for StdoutNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, RunnerResult<()>> {
        Box::pin(async move {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(Self::format(notification).as_bytes())
                .await
                .map_err(|e| RunnerError::delivery(format!("Failed to write to stdout: {}", e)))?;
            stdout
                .flush()
                .await
                .map_err(|e| RunnerError::delivery(format!("Failed to flush stdout: {}", e)))
        })
    }
}
