//! `run` and `watch`.

use std::sync::Arc;
use std::time::Duration;

use calwatch_providers::HttpFeedSource;
use calwatch_runner::{
    FileNotifier, Notifier, Pipeline, RunReport, Scheduler, SignalHandler, SmtpNotifier,
    StdoutNotifier,
};
use tracing::info;
use url::Url;

use crate::config::{NotifyMode, ResolvedSettings, Settings};
use crate::error::{ClientError, ClientResult};

/// Checks every feed once.
pub async fn run(settings: &Settings, dry_run: bool) -> ClientResult<()> {
    let (pipeline, feeds) = build(settings, dry_run)?;
    let report = pipeline.run_all(&feeds).await;
    summarize(&report)
}

/// Checks every feed every `interval_secs` until SIGINT or SIGTERM.
pub async fn watch(settings: &Settings, interval_secs: u64) -> ClientResult<()> {
    let (pipeline, feeds) = build(settings, false)?;

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let pipeline = &pipeline;
    let feeds = feeds.as_slice();
    let mut scheduler = Scheduler::new(Duration::from_secs(interval_secs));
    scheduler
        .run(signals.shutdown(), move || async move {
            summarize(&pipeline.run_all(feeds).await).map_err(|e| e.to_string())
        })
        .await;

    info!(
        runs = scheduler.state().runs,
        failures = scheduler.state().consecutive_failures,
        "Stopped watching"
    );
    Ok(())
}

fn build(settings: &Settings, dry_run: bool) -> ClientResult<(Pipeline, Vec<Url>)> {
    let resolved = settings.resolve()?;
    if resolved.feeds.is_empty() {
        return Err(ClientError::Config(
            "no feed URLs configured; set [feeds] urls or pass --feed".to_string(),
        ));
    }

    let notifier = notifier(settings, &resolved, dry_run)?;
    let source = HttpFeedSource::new(resolved.feed.clone())?;
    let pipeline = Pipeline::new(
        Arc::new(source),
        Arc::new(resolved.store.clone()),
        notifier,
        resolved.overview,
    )
    .with_persist(!dry_run);

    Ok((pipeline, resolved.feeds))
}

fn notifier(
    settings: &Settings,
    resolved: &ResolvedSettings,
    dry_run: bool,
) -> ClientResult<Arc<dyn Notifier>> {
    if dry_run {
        info!("Dry run: printing notifications, baselines are not written");
        return Ok(Arc::new(StdoutNotifier));
    }

    match resolved.notify.mode {
        NotifyMode::Smtp => {
            if resolved.overview.recipients.is_empty() {
                return Err(ClientError::Config(
                    "no recipients configured; set [feeds] recipients or pass --recipient"
                        .to_string(),
                ));
            }
            Ok(Arc::new(SmtpNotifier::new(settings.smtp_config()?)))
        }
        NotifyMode::File => Ok(Arc::new(FileNotifier::new(
            resolved.notify.output_dir.clone(),
        ))),
    }
}

/// Fails if any feed failed.
fn summarize(report: &RunReport) -> ClientResult<()> {
    let undelivered = report.undelivered();
    if undelivered > 0 {
        info!(undelivered, "Some notifications were not delivered");
    }
    match report.failures() {
        0 => Ok(()),
        failed => Err(ClientError::Run(format!(
            "{} of {} feed(s) failed",
            failed,
            report.feeds.len()
        ))),
    }
}
