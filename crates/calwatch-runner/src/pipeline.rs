//! The per-feed pipeline.
//!
//! A feed is either bootstrapped (no baseline yet: the fetched document
//! becomes the baseline, nothing is sent) or compared (the baseline is
//! diffed against the fetched document, changes are rendered and sent, and
//! the fetched document becomes the new baseline).

use std::sync::Arc;

use calwatch_core::{ChangeRenderer, DiffResult, HtmlTemplate, Localizer, diff_snapshots};
use calwatch_providers::{FeedSource, parse_snapshot_bytes};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::RunnerResult;
use crate::notify::{Notification, Notifier};
use crate::store::{FeedKey, SnapshotStore};

/// Display and delivery settings, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct OverviewSettings {
    /// Zone used to resolve floating and all-day times.
    pub localizer: Localizer,
    pub renderer: ChangeRenderer,
    pub template: HtmlTemplate,
    pub recipients: Vec<String>,
}

impl OverviewSettings {
    /// Renders a diff into a notification for `calendar_name`.
    pub fn notification(&self, diff: &DiffResult, calendar_name: Option<&str>) -> Notification {
        let sections = self.renderer.render(diff);
        Notification {
            subject: self.renderer.subject(calendar_name),
            html_body: self.renderer.render_html(&sections, &self.template),
            text_body: self.renderer.render_text(&sections),
            recipients: self.recipients.clone(),
        }
    }
}

/// What happened to one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No baseline existed; the fetched document was stored.
    Bootstrapped { events: usize },
    /// The feed matches its baseline.
    Unchanged,
    /// Changes were found and a notification was attempted.
    Notified {
        added: usize,
        removed: usize,
        modified: usize,
        delivered: bool,
    },
}

/// The result for one feed of a run.
#[derive(Debug)]
pub struct FeedReport {
    pub url: Url,
    pub result: RunnerResult<RunOutcome>,
}

/// The results of one pass over all feeds.
#[derive(Debug, Default)]
pub struct RunReport {
    pub feeds: Vec<FeedReport>,
}

impl RunReport {
    /// Number of feeds that failed.
    pub fn failures(&self) -> usize {
        self.feeds.iter().filter(|f| f.result.is_err()).count()
    }

    /// Number of feeds whose notification could not be delivered.
    pub fn undelivered(&self) -> usize {
        self.feeds
            .iter()
            .filter(|f| {
                matches!(
                    f.result,
                    Ok(RunOutcome::Notified {
                        delivered: false,
                        ..
                    })
                )
            })
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

/// Runs feeds through fetch, bootstrap or compare, and notification.
pub struct Pipeline {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    settings: OverviewSettings,
    persist: bool,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn SnapshotStore>,
        notifier: Arc<dyn Notifier>,
        settings: OverviewSettings,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            settings,
            persist: true,
        }
    }

    /// Whether baselines are written. Dry runs disable this.
    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn settings(&self) -> &OverviewSettings {
        &self.settings
    }

    /// Processes every feed in order. A failing feed does not stop the rest.
    pub async fn run_all(&self, urls: &[Url]) -> RunReport {
        let mut report = RunReport::default();
        for url in urls {
            let result = self.run_feed(url).await;
            if let Err(ref e) = result {
                error!(feed = %url, error = %e, "Feed failed");
            }
            report.feeds.push(FeedReport {
                url: url.clone(),
                result,
            });
        }

        info!(
            feeds = report.feeds.len(),
            failures = report.failures(),
            "Run complete"
        );
        report
    }

    /// Processes one feed.
    ///
    /// The fetched document is parsed before anything is stored, so a
    /// malformed feed never becomes a baseline.
    #[instrument(skip(self), fields(feed = %url))]
    pub async fn run_feed(&self, url: &Url) -> RunnerResult<RunOutcome> {
        let key = FeedKey::from_url(url.as_str());
        let new_bytes = self.source.fetch(url).await?;
        let new_snapshot =
            parse_snapshot_bytes(&new_bytes).map_err(|e| e.with_feed(url.as_str()))?;
        debug!(key = %key, events = new_snapshot.len(), "Parsed feed");

        if !self.store.exists(&key)? {
            if self.persist {
                self.store.write(&key, &new_bytes)?;
                info!(key = %key, events = new_snapshot.len(), "No baseline yet, stored current feed");
            } else {
                info!(key = %key, events = new_snapshot.len(), "No baseline yet, dry run stores nothing");
            }
            return Ok(RunOutcome::Bootstrapped {
                events: new_snapshot.len(),
            });
        }

        let old_bytes = self.store.read(&key)?;
        let old_snapshot = parse_snapshot_bytes(&old_bytes)
            .map_err(|e| e.with_feed(format!("baseline {}", key)))?;

        let diff = diff_snapshots(&old_snapshot, &new_snapshot, &self.settings.localizer);
        if diff.is_empty() {
            info!("No changes");
            return Ok(RunOutcome::Unchanged);
        }

        info!(
            added = diff.added.len(),
            removed = diff.removed.len(),
            modified = diff.modified.len(),
            "Detected changes"
        );

        let notification = self
            .settings
            .notification(&diff, new_snapshot.calendar_name.as_deref());
        let delivered = match self.notifier.send(&notification).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to deliver notification");
                false
            }
        };

        if self.persist {
            self.store.write(&key, &new_bytes)?;
            if !delivered {
                warn!("Baseline advanced although the notification was not delivered");
            }
        } else {
            debug!("Dry run, baseline left unchanged");
        }

        Ok(RunOutcome::Notified {
            added: diff.added.len(),
            removed: diff.removed.len(),
            modified: diff.modified.len(),
            delivered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use calwatch_providers::{BoxFuture, ProviderError, ProviderErrorCode, ProviderResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const FEED: &str = "https://example.com/team.ics";

    fn ics(events: &str) -> Vec<u8> {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//Test//EN\r\nX-WR-CALNAME:Team\r\n{}END:VCALENDAR\r\n",
            events
        )
        .into_bytes()
    }

    fn event(uid: &str, summary: &str, start: &str) -> String {
        format!(
            "BEGIN:VEVENT\r\nUID:{}\r\nDTSTART:{}\r\nSUMMARY:{}\r\nEND:VEVENT\r\n",
            uid, start, summary
        )
    }

    #[derive(Default)]
    struct FakeSource {
        feeds: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeSource {
        fn set(&self, url: &str, body: Vec<u8>) {
            self.feeds.lock().unwrap().insert(url.to_string(), body);
        }
    }

    impl FeedSource for FakeSource {
        fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, ProviderResult<Vec<u8>>> {
            let body = self.feeds.lock().unwrap().get(url.as_str()).cloned();
            Box::pin(async move {
                body.ok_or_else(|| ProviderError::not_found("Feed not found").with_feed(url.as_str()))
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        baselines: Mutex<HashMap<FeedKey, Vec<u8>>>,
    }

    impl MemoryStore {
        fn get(&self, url: &str) -> Option<Vec<u8>> {
            self.baselines
                .lock()
                .unwrap()
                .get(&FeedKey::from_url(url))
                .cloned()
        }
    }

    impl SnapshotStore for MemoryStore {
        fn exists(&self, key: &FeedKey) -> RunnerResult<bool> {
            Ok(self.baselines.lock().unwrap().contains_key(key))
        }

        fn read(&self, key: &FeedKey) -> RunnerResult<Vec<u8>> {
            self.baselines
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| {
                    RunnerError::io(
                        key.as_str(),
                        std::io::Error::from(std::io::ErrorKind::NotFound),
                    )
                })
        }

        fn write(&self, key: &FeedKey, bytes: &[u8]) -> RunnerResult<()> {
            self.baselines
                .lock()
                .unwrap()
                .insert(key.clone(), bytes.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, RunnerResult<()>> {
            Box::pin(async move {
                if self.fail {
                    return Err(RunnerError::Smtp("550 mailbox unavailable".to_string()));
                }
                self.sent.lock().unwrap().push(notification.clone());
                Ok(())
            })
        }
    }

    struct Harness {
        source: Arc<FakeSource>,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_notifier(RecordingNotifier::default())
        }

        fn with_notifier(notifier: RecordingNotifier) -> Self {
            Self {
                source: Arc::new(FakeSource::default()),
                store: Arc::new(MemoryStore::default()),
                notifier: Arc::new(notifier),
            }
        }

        fn pipeline(&self) -> Pipeline {
            let settings = OverviewSettings {
                recipients: vec!["team@example.com".to_string()],
                ..OverviewSettings::default()
            };
            Pipeline::new(
                self.source.clone(),
                self.store.clone(),
                self.notifier.clone(),
                settings,
            )
        }

        fn sent(&self) -> Vec<Notification> {
            self.notifier.sent.lock().unwrap().clone()
        }
    }

    fn url() -> Url {
        Url::parse(FEED).unwrap()
    }

    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            let writer = self.clone();
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::INFO)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish()
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    mod bootstrap {
        use super::*;

        #[tokio::test]
        async fn stores_baseline_without_notifying() {
            let h = Harness::new();
            let body = ics(&event("a", "Standup", "20250205T090000Z"));
            h.source.set(FEED, body.clone());

            let outcome = h.pipeline().run_feed(&url()).await.unwrap();

            assert_eq!(outcome, RunOutcome::Bootstrapped { events: 1 });
            assert_eq!(h.store.get(FEED), Some(body));
            assert!(h.sent().is_empty());
        }

        #[tokio::test]
        async fn malformed_feed_is_not_stored() {
            let h = Harness::new();
            h.source.set(FEED, b"<html>maintenance</html>".to_vec());

            let err = h.pipeline().run_feed(&url()).await.unwrap_err();

            assert!(matches!(
                err,
                RunnerError::Provider(ref e) if e.code() == ProviderErrorCode::ParseError
            ));
            assert!(h.store.get(FEED).is_none());
        }

        #[tokio::test]
        async fn dry_run_stores_nothing() {
            let h = Harness::new();
            h.source.set(FEED, ics(""));

            let outcome = h
                .pipeline()
                .with_persist(false)
                .run_feed(&url())
                .await
                .unwrap();

            assert_eq!(outcome, RunOutcome::Bootstrapped { events: 0 });
            assert!(h.store.get(FEED).is_none());
        }

        #[tokio::test]
        async fn dry_run_does_not_claim_to_store() {
            let h = Harness::new();
            h.source.set(FEED, ics(""));
            let logs = LogCapture::default();
            let _guard = tracing::subscriber::set_default(logs.subscriber());

            h.pipeline()
                .with_persist(false)
                .run_feed(&url())
                .await
                .unwrap();

            let output = logs.contents();
            assert!(output.contains("dry run stores nothing"));
            assert!(!output.contains("stored current feed"));
        }
    }

    mod compare {
        use super::*;

        #[tokio::test]
        async fn unchanged_feed_keeps_baseline() {
            let h = Harness::new();
            let old = ics(&event("a", "Standup", "20250205T090000Z"));
            h.store.write(&FeedKey::from_url(FEED), &old).unwrap();
            // Same event, different serialization.
            let new = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Other//EN\r\n\
                       BEGIN:VEVENT\r\nDTSTAMP:20250301T120000Z\r\nSUMMARY:Standup\r\n\
                       UID:a\r\nDTSTART:20250205T090000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
            h.source.set(FEED, new.as_bytes().to_vec());

            let outcome = h.pipeline().run_feed(&url()).await.unwrap();

            assert_eq!(outcome, RunOutcome::Unchanged);
            assert_eq!(h.store.get(FEED), Some(old));
            assert!(h.sent().is_empty());
        }

        #[tokio::test]
        async fn changes_are_sent_and_baseline_advances() {
            let h = Harness::new();
            let old = ics(&[
                event("a", "Standup", "20250205T090000Z"),
                event("b", "Retro", "20250206T140000Z"),
            ]
            .concat());
            let new = ics(&[
                event("a", "Daily Standup", "20250205T090000Z"),
                event("c", "Planning", "20250207T080000Z"),
            ]
            .concat());
            h.store.write(&FeedKey::from_url(FEED), &old).unwrap();
            h.source.set(FEED, new.clone());

            let outcome = h.pipeline().run_feed(&url()).await.unwrap();

            assert_eq!(
                outcome,
                RunOutcome::Notified {
                    added: 1,
                    removed: 1,
                    modified: 1,
                    delivered: true,
                }
            );
            assert_eq!(h.store.get(FEED), Some(new));

            let sent = h.sent();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].subject, "Your calendar updates (Team)");
            assert_eq!(sent[0].recipients, vec!["team@example.com".to_string()]);
            assert!(sent[0].text_body.contains("Planning"));
            assert!(sent[0].text_body.contains("Retro"));
            assert!(sent[0].html_body.contains("Daily Standup"));
        }

        #[tokio::test]
        async fn failed_delivery_still_advances_baseline() {
            let h = Harness::with_notifier(RecordingNotifier {
                fail: true,
                ..RecordingNotifier::default()
            });
            h.store
                .write(&FeedKey::from_url(FEED), &ics(""))
                .unwrap();
            let new = ics(&event("a", "Standup", "20250205T090000Z"));
            h.source.set(FEED, new.clone());

            let outcome = h.pipeline().run_feed(&url()).await.unwrap();

            assert_eq!(
                outcome,
                RunOutcome::Notified {
                    added: 1,
                    removed: 0,
                    modified: 0,
                    delivered: false,
                }
            );
            assert_eq!(h.store.get(FEED), Some(new));
        }

        #[tokio::test]
        async fn dry_run_sends_but_keeps_baseline() {
            let h = Harness::new();
            let old = ics("");
            h.store.write(&FeedKey::from_url(FEED), &old).unwrap();
            h.source
                .set(FEED, ics(&event("a", "Standup", "20250205T090000Z")));

            let outcome = h
                .pipeline()
                .with_persist(false)
                .run_feed(&url())
                .await
                .unwrap();

            assert!(matches!(outcome, RunOutcome::Notified { added: 1, .. }));
            assert_eq!(h.sent().len(), 1);
            assert_eq!(h.store.get(FEED), Some(old));
        }

        #[tokio::test]
        async fn malformed_baseline_is_an_error() {
            let h = Harness::new();
            let garbage = b"not a calendar".to_vec();
            h.store.write(&FeedKey::from_url(FEED), &garbage).unwrap();
            h.source
                .set(FEED, ics(&event("a", "Standup", "20250205T090000Z")));

            assert!(h.pipeline().run_feed(&url()).await.is_err());
            assert_eq!(h.store.get(FEED), Some(garbage));
            assert!(h.sent().is_empty());
        }
    }

    mod run_all {
        use super::*;

        #[tokio::test]
        async fn failing_feed_does_not_stop_others() {
            let h = Harness::new();
            h.source.set(FEED, ics(""));
            let missing = Url::parse("https://example.com/missing.ics").unwrap();

            let report = h.pipeline().run_all(&[missing, url()]).await;

            assert_eq!(report.feeds.len(), 2);
            assert_eq!(report.failures(), 1);
            assert!(!report.is_success());
            assert!(matches!(
                report.feeds[1].result,
                Ok(RunOutcome::Bootstrapped { events: 0 })
            ));
            assert!(h.store.get(FEED).is_some());
        }

        #[tokio::test]
        async fn counts_undelivered() {
            let h = Harness::with_notifier(RecordingNotifier {
                fail: true,
                ..RecordingNotifier::default()
            });
            h.store.write(&FeedKey::from_url(FEED), &ics("")).unwrap();
            h.source
                .set(FEED, ics(&event("a", "Standup", "20250205T090000Z")));

            let report = h.pipeline().run_all(&[url()]).await;

            assert!(report.is_success());
            assert_eq!(report.undelivered(), 1);
        }
    }
}
