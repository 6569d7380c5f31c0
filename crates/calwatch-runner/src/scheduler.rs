//! Fixed-interval repetition for `watch`.
//!
//! A pass runs to completion before shutdown is checked; the wait between
//! passes is interrupted by shutdown. There is no backoff: a failed pass is
//! recorded and the next one starts after the normal interval.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::signals::ShutdownSignal;

/// Bookkeeping across passes.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    /// Passes started so far.
    pub runs: u64,
    pub consecutive_failures: u32,
    pub last_run: Option<DateTime<Utc>>,
    /// Last pass without a failed feed.
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SchedulerState {
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success = self.last_run;
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
    }
}

/// Repeats a pass every `interval` until shutdown.
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SchedulerState::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Runs `pass` now and then once per interval until `shutdown` fires.
    ///
    /// `pass` returns `Err` with a summary when any feed failed.
    pub async fn run<F, Fut>(&mut self, shutdown: ShutdownSignal, mut pass: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        info!(interval_secs = self.interval.as_secs(), "Watch started");
        let mut shutdown = pin!(shutdown.wait());

        loop {
            self.state.runs += 1;
            self.state.last_run = Some(Utc::now());
            debug!(run = self.state.runs, "Starting pass");

            match pass().await {
                Ok(()) => self.state.record_success(),
                Err(e) => {
                    self.state.record_failure(e);
                    warn!(
                        failures = self.state.consecutive_failures,
                        error = self.state.last_error.as_deref().unwrap_or_default(),
                        "Pass had failures"
                    );
                }
            }

            debug!(delay_secs = self.interval.as_secs(), "Scheduling next pass");
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => break,
            }
        }

        info!(runs = self.state.runs, "Watch stopped");
    }
}
