//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calwatch/config.toml` by default. Every section is optional.
//!
//! SMTP credentials (`username`, `password`) support secret references:
//! - `pass::path/in/store` - resolved via `pass show`
//! - `env::VAR_NAME` - resolved from the environment
//! - plain text - used as-is

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use calwatch_core::{
    Catalog, ChangeRenderer, DEFAULT_LANGUAGE, DatePattern, HtmlTemplate, Localizer,
    TextOverrides,
};
use calwatch_providers::FeedConfig;
use calwatch_runner::{FileSnapshotStore, OverviewSettings, SmtpConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::secret;

// ---------------------------------------------------------------------------
// Settings (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for calwatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feeds: FeedSettings,
    pub display: DisplaySettings,
    pub store: StoreSettings,
    pub smtp: SmtpSettings,
    pub notify: NotifySettings,

    /// Extra languages or overrides for built-in ones, keyed by code.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub texts: BTreeMap<String, TextOverrides>,
}

/// Which feeds to check and who hears about changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub urls: Vec<String>,
    pub recipients: Vec<String>,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    pub verify_tls: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            recipients: Vec::new(),
            timeout: FeedConfig::DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
        }
    }
}

/// How times and texts are presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// IANA zone for floating and all-day times, and for display.
    pub timezone: String,
    /// strftime pattern for start and end times.
    pub date_format: String,
    pub language: String,
    /// HTML template replacing the built-in one.
    pub template_path: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_string(),
            date_format: DatePattern::DEFAULT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            template_path: None,
        }
    }
}

/// Where baselines are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Defaults to the platform data directory.
    pub dir: Option<PathBuf>,
    /// Baseline file name; `{}` receives the feed key.
    pub old_template: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            dir: None,
            old_template: FileSnapshotStore::DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Mail server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    /// 587 uses STARTTLS, any other port implicit TLS.
    pub port: u16,
    /// Supports `pass::` and `env::` references.
    pub username: String,
    /// Supports `pass::` and `env::` references.
    pub password: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub verify_certificates: bool,
    /// Session timeout in seconds.
    pub timeout: u64,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 465,
            username: String::new(),
            password: String::new(),
            sender_email: String::new(),
            sender_name: None,
            verify_certificates: true,
            timeout: SmtpConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Delivery mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    /// Send mail.
    #[default]
    Smtp,
    /// Write the HTML body to `output_dir`.
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub mode: NotifyMode,
    pub output_dir: PathBuf,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            mode: NotifyMode::Smtp,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Settings after validation, ready to build a pipeline from.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub feeds: Vec<Url>,
    pub overview: OverviewSettings,
    pub store: FileSnapshotStore,
    pub feed: FeedConfig,
    pub notify: NotifySettings,
}

impl Settings {
    /// Loads configuration from the default path, or defaults if there is
    /// no file.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calwatch")
    }

    /// Returns the default baseline directory.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calwatch")
    }

    /// Replaces the configured feeds and recipients with non-empty overrides.
    #[must_use]
    pub fn with_overrides(mut self, feeds: &[String], recipients: &[String]) -> Self {
        if !feeds.is_empty() {
            self.feeds.urls = feeds.to_vec();
        }
        if !recipients.is_empty() {
            self.feeds.recipients = recipients.to_vec();
        }
        self
    }

    /// Validates everything except SMTP credentials.
    pub fn resolve(&self) -> ClientResult<ResolvedSettings> {
        let feeds = self.feed_urls()?;
        let store_dir = self
            .store
            .dir
            .clone()
            .unwrap_or_else(Self::default_data_dir);
        let store = FileSnapshotStore::new(store_dir, self.store.old_template.clone())?;

        Ok(ResolvedSettings {
            feeds,
            overview: self.overview()?,
            store,
            feed: FeedConfig::default()
                .with_timeout(Duration::from_secs(self.feeds.timeout))
                .with_verify_tls(self.feeds.verify_tls),
            notify: self.notify.clone(),
        })
    }

    /// Parses the feed URLs. Blank entries are ignored.
    pub fn feed_urls(&self) -> ClientResult<Vec<Url>> {
        self.feeds
            .urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(|u| {
                Url::parse(u)
                    .map_err(|e| ClientError::Config(format!("invalid feed URL '{}': {}", u, e)))
            })
            .collect()
    }

    /// Builds the display settings: zone, date pattern, language and template.
    pub fn overview(&self) -> ClientResult<OverviewSettings> {
        let localizer = Localizer::parse(&self.display.timezone)?;
        let pattern = DatePattern::new(self.display.date_format.clone())?;

        let catalog = self.catalog();
        if catalog.get(&self.display.language).is_none() {
            warn!(
                language = %self.display.language,
                "Unknown language, falling back to {}", DEFAULT_LANGUAGE
            );
        }
        let locale = catalog.resolve(&self.display.language);

        let template = match self.display.template_path {
            Some(ref path) => load_template(path)?,
            None => HtmlTemplate::default(),
        };

        Ok(OverviewSettings {
            localizer,
            renderer: ChangeRenderer::new(localizer, pattern, locale),
            template,
            recipients: self.recipients(),
        })
    }

    /// Built-in languages merged with the `[texts.*]` sections.
    pub fn catalog(&self) -> Catalog {
        let mut catalog = Catalog::builtin();
        for (code, overrides) in &self.texts {
            catalog.apply(code, overrides);
        }
        catalog
    }

    pub fn recipients(&self) -> Vec<String> {
        self.feeds
            .recipients
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect()
    }

    /// Builds the SMTP settings, resolving credential references.
    pub fn smtp_config(&self) -> ClientResult<SmtpConfig> {
        let smtp = &self.smtp;
        if smtp.host.trim().is_empty() {
            return Err(ClientError::Config(format!(
                "[smtp] host is missing in {}",
                Self::default_path().display()
            )));
        }
        if smtp.sender_email.trim().is_empty() {
            return Err(ClientError::Config(
                "[smtp] sender_email is missing".to_string(),
            ));
        }

        let username = secret::resolve(&smtp.username)
            .map_err(|e| ClientError::Config(format!("failed to resolve smtp username: {}", e)))?;
        let password = secret::resolve(&smtp.password)
            .map_err(|e| ClientError::Config(format!("failed to resolve smtp password: {}", e)))?;

        let mut config = SmtpConfig::new(smtp.host.trim(), smtp.port, smtp.sender_email.trim())
            .with_credentials(username, password)
            .with_verify_certificates(smtp.verify_certificates)
            .with_timeout(Duration::from_secs(smtp.timeout));
        if let Some(ref name) = smtp.sender_name {
            config = config.with_sender_name(name);
        }
        Ok(config)
    }

    /// A copy safe to print: plain-text passwords are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let password = secret::SecretRef::parse(&copy.smtp.password);
        if !copy.smtp.password.is_empty() && !password.is_reference() {
            copy.smtp.password = "********".to_string();
        }
        copy
    }
}

fn load_template(path: &Path) -> ClientResult<HtmlTemplate> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        ClientError::Config(format!("failed to read template {}: {}", path.display(), e))
    })?;
    let template = HtmlTemplate::new(source);
    let missing = template.missing_placeholders();
    if !missing.is_empty() {
        warn!(
            path = %path.display(),
            missing = ?missing,
            "Template lacks placeholders, those parts will not appear"
        );
    }
    Ok(template)
}
