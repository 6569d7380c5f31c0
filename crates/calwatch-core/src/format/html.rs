//! HTML mail bodies.

use super::{EventFragment, FragmentLine, RenderedSections, Section, html_escape};
use crate::i18n::Locale;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{lang}}">
<head>
<meta charset="utf-8">
<style>
body { font-family: sans-serif; color: #222; }
h3 { margin-top: 1.5em; }
.symbol { display: inline-block; width: 1.5em; }
footer { margin-top: 2em; font-size: 0.8em; color: #777; }
</style>
</head>
<body>
<h2>{{header}}</h2>
{{added_events}}
{{removed_events}}
{{modified_events}}
<footer>{{footer}}</footer>
</body>
</html>
"#;

const EVENT_SEPARATOR: &str = "\n<hr size=\"1\" />\n";

/// An HTML document with `{{name}}` placeholders.
///
/// Recognized placeholders: `lang`, `header`, `footer`, `added_events`,
/// `removed_events` and `modified_events`. Unknown placeholders are kept
/// verbatim. Substitution is a single pass, so event text that looks like a
/// placeholder is never expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTemplate {
    source: String,
}

impl HtmlTemplate {
    /// Placeholders a template is expected to contain.
    pub const PLACEHOLDERS: [&'static str; 6] = [
        "lang",
        "header",
        "footer",
        "added_events",
        "removed_events",
        "modified_events",
    ];

    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the recognized placeholders the template does not use.
    pub fn missing_placeholders(&self) -> Vec<&'static str> {
        Self::PLACEHOLDERS
            .into_iter()
            .filter(|name| !self.source.contains(&format!("{{{{{name}}}}}")))
            .collect()
    }

    /// Renders a full document.
    pub fn render(&self, sections: &RenderedSections, locale: &Locale) -> String {
        let texts = &locale.texts;
        let lang = locale.html_lang();
        let header = html_escape(&texts.header);
        let footer = html_escape(&texts.footer);
        let added = render_section(Section::Added, sections, locale);
        let removed = render_section(Section::Removed, sections, locale);
        let modified = render_section(Section::Modified, sections, locale);

        substitute(&self.source, |name| match name {
            "lang" => Some(lang.as_str()),
            "header" => Some(header.as_str()),
            "footer" => Some(footer.as_str()),
            "added_events" => Some(added.as_str()),
            "removed_events" => Some(removed.as_str()),
            "modified_events" => Some(modified.as_str()),
            _ => None,
        })
    }
}

impl Default for HtmlTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

/// Renders a section heading and its events, or nothing for an empty section.
fn render_section(section: Section, sections: &RenderedSections, locale: &Locale) -> String {
    let fragments = sections.section(section);
    if fragments.is_empty() {
        return String::new();
    }

    let events: Vec<String> = fragments.iter().map(render_fragment).collect();
    format!(
        "<h3>{}</h3>\n{}",
        html_escape(section.heading(&locale.texts)),
        events.join(EVENT_SEPARATOR)
    )
}

fn render_fragment(fragment: &EventFragment) -> String {
    fragment
        .lines
        .iter()
        .map(render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_line(line: &FragmentLine) -> String {
    format!(
        "<div style=\"padding-left: 20px;\"><span class=\"symbol\">{}</span><strong>{}</strong>&nbsp;<span>{}</span></div>",
        line.kind.symbol(),
        html_escape(&line.label),
        html_escape(&line.value)
    )
}

fn substitute<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match lookup(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(name);
                out.push_str("}}");
            }
        }
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}
