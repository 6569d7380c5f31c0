//! `diff`: compare two local calendar files.

use std::path::Path;

use calwatch_core::diff_snapshots;
use calwatch_providers::parse_snapshot_bytes;
use calwatch_runner::OverviewSettings;
use tracing::info;

use crate::config::Settings;
use crate::error::{ClientError, ClientResult};

/// Prints the changes from `old` to `new` as text or HTML.
pub async fn diff(settings: &Settings, old: &Path, new: &Path, html: bool) -> ClientResult<()> {
    let overview = settings.overview()?;
    let old_bytes = read(old).await?;
    let new_bytes = read(new).await?;

    match render(&overview, &old_bytes, &new_bytes, html)? {
        Some(output) => print!("{}", output),
        None => info!("No changes"),
    }
    Ok(())
}

async fn read(path: &Path) -> ClientResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        ClientError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

/// Renders the diff, or `None` when the files describe the same events.
fn render(
    overview: &OverviewSettings,
    old: &[u8],
    new: &[u8],
    html: bool,
) -> ClientResult<Option<String>> {
    let old = parse_snapshot_bytes(old)?;
    let new = parse_snapshot_bytes(new)?;

    let diff = diff_snapshots(&old, &new, &overview.localizer);
    if diff.is_empty() {
        return Ok(None);
    }

    let renderer = &overview.renderer;
    let sections = renderer.render(&diff);
    let output = if html {
        renderer.render_html(&sections, &overview.template)
    } else {
        format!(
            "{}\n\n{}",
            renderer.subject(new.calendar_name.as_deref()),
            renderer.render_text(&sections)
        )
    };
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const OLD: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n\
        X-WR-CALNAME:Team\r\n\
        BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20250205T090000Z\r\nSUMMARY:Standup\r\nEND:VEVENT\r\n\
        END:VCALENDAR\r\n";

    const NEW: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n\
        X-WR-CALNAME:Team\r\n\
        BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20250205T093000Z\r\nSUMMARY:Standup\r\nEND:VEVENT\r\n\
        END:VCALENDAR\r\n";

    #[test]
    fn identical_files() {
        let overview = OverviewSettings::default();
        assert_eq!(
            render(&overview, OLD.as_bytes(), OLD.as_bytes(), false).unwrap(),
            None
        );
    }

    #[test]
    fn text_output() {
        let overview = OverviewSettings::default();
        let output = render(&overview, OLD.as_bytes(), NEW.as_bytes(), false)
            .unwrap()
            .unwrap();

        assert!(output.starts_with("Your calendar updates (Team)\n\nEvent Overview\n"));
        assert!(output.contains("Modified events:"));
        assert!(output.contains("05.02.2025 ⋅ 09:30"));
    }

    #[test]
    fn html_output() {
        let overview = OverviewSettings::default();
        let output = render(&overview, OLD.as_bytes(), NEW.as_bytes(), true)
            .unwrap()
            .unwrap();

        assert!(output.contains("<html"));
        assert!(output.contains("Standup"));
    }

    #[test]
    fn malformed_input() {
        let overview = OverviewSettings::default();
        assert!(matches!(
            render(&overview, b"garbage", NEW.as_bytes(), false),
            Err(ClientError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn missing_file() {
        let mut new = NamedTempFile::new().unwrap();
        new.write_all(NEW.as_bytes()).unwrap();

        let err = diff(
            &Settings::default(),
            Path::new("/nonexistent/old.ics"),
            new.path(),
            false,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/old.ics"));
    }
}
