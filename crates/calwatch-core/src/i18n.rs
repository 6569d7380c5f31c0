//! Localized mail texts.
//!
//! A [`Catalog`] maps language codes to [`Texts`]. English is always present
//! and is used for any code the catalog does not know.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The language used when a requested code is unknown.
pub const DEFAULT_LANGUAGE: &str = "EN";

/// Labels for the compared fields, used in the "changes" line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLabels {
    pub summary: String,
    pub start: String,
    pub end: String,
    pub location: String,
}

impl Default for FieldLabels {
    fn default() -> Self {
        Self {
            summary: "Title".to_string(),
            start: "Start".to_string(),
            end: "End".to_string(),
            location: "Location".to_string(),
        }
    }
}

/// All texts of one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Texts {
    /// Mail subject; the calendar name is appended in parentheses.
    pub subject: String,
    pub header: String,
    /// Heading of the added section.
    pub added: String,
    /// Heading of the modified section.
    pub modified: String,
    /// Heading of the removed section.
    pub removed: String,
    pub event: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub changes: String,
    /// Shown in place of a missing end time.
    pub not_available: String,
    /// Used when the feed has no `X-WR-CALNAME`.
    pub unknown_calendar: String,
    pub footer: String,
    pub fields: FieldLabels,
}

impl Texts {
    /// The built-in English texts.
    pub fn english() -> Self {
        Self {
            subject: "Your calendar updates".to_string(),
            header: "Event Overview".to_string(),
            added: "Added events:".to_string(),
            modified: "Modified events:".to_string(),
            removed: "Removed events:".to_string(),
            event: "Event:".to_string(),
            start: "Start:".to_string(),
            end: "End:".to_string(),
            location: "Location:".to_string(),
            changes: "Changes:".to_string(),
            not_available: "N/A".to_string(),
            unknown_calendar: "Unknown calendar".to_string(),
            footer: "This email was automatically generated. Please do not reply.".to_string(),
            fields: FieldLabels::default(),
        }
    }

    /// The built-in German texts.
    pub fn german() -> Self {
        Self {
            subject: "Ihre Kalenderaktualisierungen".to_string(),
            header: "Termin-Übersicht".to_string(),
            added: "Hinzugefügte Termine:".to_string(),
            modified: "Geänderte Termine:".to_string(),
            removed: "Entfernte Termine:".to_string(),
            event: "Termin:".to_string(),
            start: "Start:".to_string(),
            end: "Ende:".to_string(),
            location: "Ort:".to_string(),
            changes: "Änderungen:".to_string(),
            not_available: "k. A.".to_string(),
            unknown_calendar: "Unbekannter Kalender".to_string(),
            footer: "Diese E-Mail wurde automatisch generiert. Bitte nicht antworten."
                .to_string(),
            fields: FieldLabels {
                summary: "Titel".to_string(),
                start: "Start".to_string(),
                end: "Ende".to_string(),
                location: "Ort".to_string(),
            },
        }
    }

    /// Returns the mail subject for a calendar.
    pub fn subject_for(&self, calendar_name: Option<&str>) -> String {
        let name = calendar_name.unwrap_or(&self.unknown_calendar);
        format!("{} ({})", self.subject, name)
    }

    fn apply(&mut self, overrides: &TextOverrides) {
        let pairs = [
            (&mut self.subject, &overrides.subject),
            (&mut self.header, &overrides.header),
            (&mut self.added, &overrides.added),
            (&mut self.modified, &overrides.modified),
            (&mut self.removed, &overrides.removed),
            (&mut self.event, &overrides.event),
            (&mut self.start, &overrides.start),
            (&mut self.end, &overrides.end),
            (&mut self.location, &overrides.location),
            (&mut self.changes, &overrides.changes),
            (&mut self.not_available, &overrides.not_available),
            (&mut self.unknown_calendar, &overrides.unknown_calendar),
            (&mut self.footer, &overrides.footer),
        ];
        for (slot, value) in pairs {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
        if let Some(fields) = &overrides.fields {
            self.fields = fields.clone();
        }
    }
}

impl Default for Texts {
    fn default() -> Self {
        Self::english()
    }
}

/// Partial texts from configuration, merged over a built-in language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_available: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_calendar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldLabels>,
}

/// A resolved language: the code actually used and its texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub code: String,
    pub texts: Texts,
}

impl Locale {
    /// Returns the value for the HTML `lang` attribute.
    pub fn html_lang(&self) -> String {
        self.code.to_ascii_lowercase()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            code: DEFAULT_LANGUAGE.to_string(),
            texts: Texts::english(),
        }
    }
}

/// Texts keyed by upper-case language code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<String, Texts>,
}

impl Catalog {
    /// Creates a catalog with the built-in languages.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(DEFAULT_LANGUAGE.to_string(), Texts::english());
        entries.insert("DE".to_string(), Texts::german());
        Self { entries }
    }

    /// Merges overrides into a language.
    ///
    /// A code not in the catalog yet starts from the English texts.
    pub fn apply(&mut self, code: &str, overrides: &TextOverrides) {
        self.entries
            .entry(normalize_code(code))
            .or_insert_with(Texts::english)
            .apply(overrides);
    }

    /// Returns the texts for `code`, if present.
    pub fn get(&self, code: &str) -> Option<&Texts> {
        self.entries.get(&normalize_code(code))
    }

    /// Returns the known language codes.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolves `code`, falling back to English.
    pub fn resolve(&self, code: &str) -> Locale {
        let code = normalize_code(code);
        match self.entries.get(&code) {
            Some(texts) => Locale {
                code,
                texts: texts.clone(),
            },
            None => Locale {
                code: DEFAULT_LANGUAGE.to_string(),
                texts: self
                    .entries
                    .get(DEFAULT_LANGUAGE)
                    .cloned()
                    .unwrap_or_else(Texts::english),
            },
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_languages() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.languages().collect::<Vec<_>>(), ["DE", "EN"]);
        assert_eq!(catalog.get("de").unwrap().end, "Ende:");
        assert_eq!(catalog.get("EN").unwrap().end, "End:");
    }

    #[test]
    fn unknown_code_falls_back_to_english() {
        let locale = Catalog::builtin().resolve("FR");
        assert_eq!(locale.code, "EN");
        assert_eq!(locale.texts, Texts::english());
        assert_eq!(locale.html_lang(), "en");
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let locale = Catalog::builtin().resolve(" de ");
        assert_eq!(locale.code, "DE");
        assert_eq!(locale.html_lang(), "de");
        assert_eq!(locale.texts.header, "Termin-Übersicht");
    }

    #[test]
    fn overrides_merge_over_builtin() {
        let mut catalog = Catalog::builtin();
        catalog.apply(
            "DE",
            &TextOverrides {
                subject: Some("Kalender".to_string()),
                ..Default::default()
            },
        );

        let texts = catalog.get("DE").unwrap();
        assert_eq!(texts.subject, "Kalender");
        assert_eq!(texts.header, "Termin-Übersicht");
    }

    #[test]
    fn new_language_starts_from_english() {
        let mut catalog = Catalog::builtin();
        catalog.apply(
            "fr",
            &TextOverrides {
                event: Some("Événement :".to_string()),
                ..Default::default()
            },
        );

        let locale = catalog.resolve("FR");
        assert_eq!(locale.code, "FR");
        assert_eq!(locale.texts.event, "Événement :");
        assert_eq!(locale.texts.start, "Start:");
    }

    #[test]
    fn subject_includes_calendar_name() {
        let texts = Texts::german();
        assert_eq!(
            texts.subject_for(Some("Team")),
            "Ihre Kalenderaktualisierungen (Team)"
        );
        assert_eq!(
            texts.subject_for(None),
            "Ihre Kalenderaktualisierungen (Unbekannter Kalender)"
        );
    }

    #[test]
    fn partial_texts_deserialize_with_english_defaults() {
        let texts: Texts = serde_json::from_str(r#"{"header":"Overview"}"#).unwrap();
        assert_eq!(texts.header, "Overview");
        assert_eq!(texts.footer, Texts::english().footer);
    }
}
