//! calwatch CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calwatch_client::cli::{Cli, Command, ConfigAction};
use calwatch_client::commands;
use calwatch_client::config::Settings;
use calwatch_client::error::ClientResult;
use calwatch_core::tracing::{TracingConfig, init_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::for_cli(cli.debug, cli.log_json)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let settings = match cli.config {
        Some(ref path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    match cli.command {
        None => commands::run::run(&settings, false).await,
        Some(Command::Run { dry_run, feeds }) => {
            let settings = settings.with_overrides(&feeds.feeds, &feeds.recipients);
            commands::run::run(&settings, dry_run).await
        }
        Some(Command::Watch { interval, feeds }) => {
            let settings = settings.with_overrides(&feeds.feeds, &feeds.recipients);
            commands::run::watch(&settings, interval).await
        }
        Some(Command::Diff { old, new, html }) => {
            commands::diff::diff(&settings, &old, &new, html).await
        }
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&settings),
            ConfigAction::Validate => commands::config::validate(&settings),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
