//! Rendering of snapshot changes.
//!
//! [`ChangeRenderer`] turns a [`DiffResult`] into [`RenderedSections`]: one
//! list of [`EventFragment`]s per section, each fragment an ordered list of
//! labelled lines. The fragments are then laid out either as plain text
//! ([`ChangeRenderer::render_text`]) or through an [`HtmlTemplate`].
//!
//! Fragment lines, in order:
//! - event label and summary
//! - start, formatted in the configured zone
//! - end, or the "not available" marker
//! - location, only when present
//! - changed field labels, only for modified events

mod html;

pub use html::HtmlTemplate;

use serde::Serialize;

use crate::diff::{ChangedField, DiffResult};
use crate::event::NormalizedEvent;
use crate::i18n::{Locale, Texts};
use crate::time::{DatePattern, Localizer};

/// The sections of an overview, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Added,
    Removed,
    Modified,
}

impl Section {
    pub const ALL: [Section; 3] = [Self::Added, Self::Removed, Self::Modified];

    /// Returns the localized heading.
    pub fn heading(self, texts: &Texts) -> &str {
        match self {
            Self::Added => &texts.added,
            Self::Removed => &texts.removed,
            Self::Modified => &texts.modified,
        }
    }
}

/// What a fragment line shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Event,
    Start,
    End,
    Location,
    Changes,
}

impl LineKind {
    /// Returns the symbol shown before the label in HTML.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Event => "📅",
            Self::Start | Self::End => "⏰",
            Self::Location => "📍",
            Self::Changes => "🔄",
        }
    }
}

/// One labelled line of an event fragment. Text is not escaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentLine {
    pub kind: LineKind,
    pub label: String,
    pub value: String,
}

/// The rendered lines of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFragment {
    pub uid: String,
    pub lines: Vec<FragmentLine>,
}

impl EventFragment {
    /// Returns the line of the given kind, if present.
    pub fn line(&self, kind: LineKind) -> Option<&FragmentLine> {
        self.lines.iter().find(|line| line.kind == kind)
    }
}

/// Fragments per section. A section with no events has no fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedSections {
    pub added: Vec<EventFragment>,
    pub removed: Vec<EventFragment>,
    pub modified: Vec<EventFragment>,
}

impl RenderedSections {
    /// Returns the fragments of a section.
    pub fn section(&self, section: Section) -> &[EventFragment] {
        match section {
            Section::Added => &self.added,
            Section::Removed => &self.removed,
            Section::Modified => &self.modified,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Renders diff results with a fixed zone, date pattern and language.
#[derive(Debug, Clone, Default)]
pub struct ChangeRenderer {
    localizer: Localizer,
    pattern: DatePattern,
    locale: Locale,
}

impl ChangeRenderer {
    pub fn new(localizer: Localizer, pattern: DatePattern, locale: Locale) -> Self {
        Self {
            localizer,
            pattern,
            locale,
        }
    }

    /// Returns the language used for labels.
    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Returns the mail subject for a calendar.
    pub fn subject(&self, calendar_name: Option<&str>) -> String {
        self.locale.texts.subject_for(calendar_name)
    }

    /// Renders every section of a diff.
    pub fn render(&self, diff: &DiffResult) -> RenderedSections {
        RenderedSections {
            added: diff
                .added
                .iter()
                .map(|event| self.render_event(event, None))
                .collect(),
            removed: diff
                .removed
                .iter()
                .map(|event| self.render_event(event, None))
                .collect(),
            modified: diff
                .modified
                .iter()
                .map(|m| self.render_event(&m.event, Some(&m.changed_fields)))
                .collect(),
        }
    }

    /// Renders one event, with a changes line when `changes` is given.
    pub fn render_event(
        &self,
        event: &NormalizedEvent,
        changes: Option<&[ChangedField]>,
    ) -> EventFragment {
        let texts = &self.locale.texts;
        let mut lines = Vec::with_capacity(5);

        lines.push(FragmentLine {
            kind: LineKind::Event,
            label: texts.event.clone(),
            value: event
                .summary
                .clone()
                .unwrap_or_else(|| texts.not_available.clone()),
        });
        lines.push(FragmentLine {
            kind: LineKind::Start,
            label: texts.start.clone(),
            value: self.format_time(&event.start),
        });
        lines.push(FragmentLine {
            kind: LineKind::End,
            label: texts.end.clone(),
            value: event
                .end
                .as_ref()
                .map(|end| self.format_time(end))
                .unwrap_or_else(|| texts.not_available.clone()),
        });
        if let Some(location) = &event.location {
            lines.push(FragmentLine {
                kind: LineKind::Location,
                label: texts.location.clone(),
                value: location.clone(),
            });
        }
        if let Some(changes) = changes {
            let labels: Vec<&str> = changes.iter().map(|f| self.field_label(*f)).collect();
            lines.push(FragmentLine {
                kind: LineKind::Changes,
                label: texts.changes.clone(),
                value: labels.join(", "),
            });
        }

        EventFragment {
            uid: event.uid.clone(),
            lines,
        }
    }

    /// Returns the localized label of a changed field.
    pub fn field_label(&self, field: ChangedField) -> &str {
        let labels = &self.locale.texts.fields;
        match field {
            ChangedField::Summary => &labels.summary,
            ChangedField::Start => &labels.start,
            ChangedField::End => &labels.end,
            ChangedField::Location => &labels.location,
        }
    }

    /// Lays out rendered sections as plain text.
    ///
    /// Empty sections are left out; events within a section are separated by
    /// a blank line.
    pub fn render_text(&self, sections: &RenderedSections) -> String {
        let texts = &self.locale.texts;
        let mut out = format!("{}\n", texts.header);

        for section in Section::ALL {
            let fragments = sections.section(section);
            if fragments.is_empty() {
                continue;
            }
            out.push('\n');
            out.push_str(section.heading(texts));
            out.push('\n');
            for (i, fragment) in fragments.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                for line in &fragment.lines {
                    out.push_str(&format!("  {} {}\n", line.label, line.value));
                }
            }
        }

        out.push('\n');
        out.push_str(&texts.footer);
        out.push('\n');
        out
    }

    /// Lays out rendered sections through an HTML template.
    pub fn render_html(&self, sections: &RenderedSections, template: &HtmlTemplate) -> String {
        template.render(sections, &self.locale)
    }

    fn format_time(&self, dt: &chrono::DateTime<chrono::FixedOffset>) -> String {
        self.pattern.format(&self.localizer.to_local(dt))
    }
}

/// Escapes text for HTML display.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
