//! Feed processing for calwatch.
//!
//! - [`Pipeline`] - fetch, bootstrap or compare, notify, advance the baseline
//! - [`SnapshotStore`] / [`FileSnapshotStore`] - baseline persistence
//! - [`Notifier`] - SMTP, file and stdout delivery
//! - [`Scheduler`] - repeats a pass on an interval until shutdown

pub mod error;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod signals;
pub mod store;

pub use error::{RunnerError, RunnerResult};
pub use notify::{
    FileNotifier, Notification, Notifier, SmtpConfig, SmtpNotifier, StdoutNotifier, TlsMode,
};
pub use pipeline::{FeedReport, OverviewSettings, Pipeline, RunOutcome, RunReport};
pub use scheduler::{Scheduler, SchedulerState};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use store::{FEED_KEY_MAX_CHARS, FeedKey, FileSnapshotStore, SnapshotStore};
