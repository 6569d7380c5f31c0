//! Configuration commands.

use crate::config::{NotifyMode, Settings};
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout, with plain passwords masked.
pub fn dump(settings: &Settings) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&settings.redacted())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", Settings::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration, including SMTP credentials in SMTP mode.
pub fn validate(settings: &Settings) -> ClientResult<()> {
    let resolved = settings.resolve()?;

    if resolved.notify.mode == NotifyMode::Smtp {
        let smtp = settings.smtp_config()?;
        println!(
            "SMTP: {}:{} ({:?})",
            smtp.host,
            smtp.port,
            smtp.tls_mode()
        );
        if resolved.overview.recipients.is_empty() {
            println!("warning: no recipients configured");
        }
    }

    if resolved.feeds.is_empty() {
        println!("warning: no feed URLs configured");
    }
    for feed in &resolved.feeds {
        println!("feed: {}", feed);
    }
    println!(
        "languages: {}",
        settings.catalog().languages().collect::<Vec<_>>().join(", ")
    );
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    println!("config: {}", Settings::default_path().display());
    println!("data: {}", Settings::default_data_dir().display());
    Ok(())
}
