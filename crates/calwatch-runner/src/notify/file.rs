//! HTML file output instead of mail.

use std::path::{Path, PathBuf};

use calwatch_providers::BoxFuture;
use chrono::Local;
use tracing::info;

use super::{Notification, Notifier};
use crate::error::{RunnerError, RunnerResult};

/// Writes each notification's HTML body to
/// `calendar-overview_<timestamp>.html` in a directory.
#[derive(Debug, Clone)]
pub struct FileNotifier {
    dir: PathBuf,
}

impl FileNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d%H%M%S%6f");
        self.dir.join(format!("calendar-overview_{}.html", stamp))
    }

    async fn write(&self, notification: &Notification) -> RunnerResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RunnerError::io(&self.dir, e))?;

        let path = self.next_path();
        tokio::fs::write(&path, notification.html_body.as_bytes())
            .await
            .map_err(|e| RunnerError::io(&path, e))?;

        info!(path = %path.display(), subject = %notification.subject, "Saved overview to file");
        Ok(())
    }
}

impl Notifier for FileNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, RunnerResult<()>> {
        Box::pin(self.write(notification))
    }
}
