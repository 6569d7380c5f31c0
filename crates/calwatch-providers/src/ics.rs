//! ICS/iCalendar parsing.
//!
//! Parses an iCalendar (RFC 5545) document into a [`Snapshot`], keeping the
//! four compared properties of every VEVENT exactly as written.

use calwatch_core::{RawEvent, RawEventTime, Snapshot};
use icalendar::parser::{Component, Property, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

const CALENDAR_NAME: &str = "X-WR-CALNAME";

/// Parses a feed body.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; a leading byte
/// order mark is ignored.
pub fn parse_snapshot_bytes(bytes: &[u8]) -> ProviderResult<Snapshot> {
    let text = String::from_utf8_lossy(bytes);
    parse_snapshot(text.trim_start_matches('\u{feff}'))
}

/// Parses an iCalendar document.
///
/// VEVENTs without a UID or a usable DTSTART are skipped with a warning.
///
/// # Errors
///
/// Returns a parse error if the text is not an iCalendar document.
pub fn parse_snapshot(ics: &str) -> ProviderResult<Snapshot> {
    let unfolded = unfold(ics);
    if !starts_with_vcalendar(&unfolded) {
        return Err(ProviderError::parse("Document does not start with BEGIN:VCALENDAR"));
    }

    let calendar = read_calendar(&unfolded)
        .map_err(|e| ProviderError::parse(format!("Invalid iCalendar data: {}", e)))?;

    let mut calendar_name = find_value(&calendar.properties, CALENDAR_NAME);
    let mut events = Vec::new();

    for component in &calendar.components {
        if is(component, "VCALENDAR") {
            if calendar_name.is_none() {
                calendar_name = find_value(&component.properties, CALENDAR_NAME);
            }
            events.extend(component.components.iter().filter_map(parse_vevent));
        } else {
            events.extend(parse_vevent(component));
        }
    }

    debug!(
        events = events.len(),
        calendar = ?calendar_name,
        "Parsed calendar document"
    );

    Ok(Snapshot {
        calendar_name,
        events,
    })
}

fn starts_with_vcalendar(text: &str) -> bool {
    text.trim_start()
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
}

fn is(component: &Component<'_>, name: &str) -> bool {
    component.name.as_ref().eq_ignore_ascii_case(name)
}

fn find_value(properties: &[Property<'_>], name: &str) -> Option<String> {
    properties
        .iter()
        .find(|p| p.name.as_ref().eq_ignore_ascii_case(name))
        .map(|p| unescape_text(p.val.as_ref()))
}

/// Converts one VEVENT; other components yield `None`.
fn parse_vevent(component: &Component<'_>) -> Option<RawEvent> {
    if !is(component, "VEVENT") {
        return None;
    }

    let Some(uid) = component.find_prop("UID").map(|p| p.val.to_string()) else {
        warn!("Skipping VEVENT without UID");
        return None;
    };

    let start = match component.find_prop("DTSTART").map(parse_time) {
        Some(Some(start)) => start,
        Some(None) => {
            warn!(uid = %uid, "Skipping VEVENT with unreadable DTSTART");
            return None;
        }
        None => {
            warn!(uid = %uid, "Skipping VEVENT without DTSTART");
            return None;
        }
    };

    let end = component.find_prop("DTEND").and_then(|p| {
        let parsed = parse_time(p);
        if parsed.is_none() {
            let value: &str = p.val.as_ref();
            warn!(uid = %uid, value, "Ignoring unreadable DTEND");
        }
        parsed
    });

    let event = RawEvent {
        summary: find_value(&component.properties, "SUMMARY"),
        location: find_value(&component.properties, "LOCATION"),
        uid,
        start,
        end,
    };

    debug!(
        uid = %event.uid,
        summary = ?event.summary,
        start = ?event.start,
        "Parsed event from ICS"
    );

    Some(event)
}

fn parse_time(property: &Property<'_>) -> Option<RawEventTime> {
    DatePerhapsTime::try_from(property).ok().map(convert_date_time)
}

/// Converts icalendar's value, preserving how it was written.
fn convert_date_time(dt: DatePerhapsTime) -> RawEventTime {
    match dt {
        DatePerhapsTime::Date(date) => RawEventTime::Date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => RawEventTime::Utc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            RawEventTime::Floating(naive)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            RawEventTime::Zoned { date_time, tzid }
        }
    }
}

/// Undoes RFC 5545 TEXT escaping (`\\`, `\;`, `\,`, `\n`).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn wrap(body: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//Test//EN\r\n{}END:VCALENDAR\r\n",
            body
        )
    }

    fn sample_ics() -> String {
        wrap(
            "X-WR-CALNAME:Team\r\n\
             BEGIN:VEVENT\r\n\
             UID:test-event-1@example.com\r\n\
             DTSTART:20250205T100000Z\r\n\
             DTEND:20250205T110000Z\r\n\
             SUMMARY:Team Meeting\r\n\
             LOCATION:Conference Room A\r\n\
             END:VEVENT\r\n",
        )
    }

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 5).unwrap()
    }

    mod documents {
        use super::*;

        #[test]
        fn parse_basic_event() {
            let snapshot = parse_snapshot(&sample_ics()).unwrap();

            assert_eq!(snapshot.calendar_name.as_deref(), Some("Team"));
            assert_eq!(snapshot.len(), 1);
            let event = &snapshot.events[0];
            assert_eq!(event.uid, "test-event-1@example.com");
            assert_eq!(event.summary.as_deref(), Some("Team Meeting"));
            assert_eq!(event.location.as_deref(), Some("Conference Room A"));
            assert_eq!(
                event.start,
                RawEventTime::Utc(Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap())
            );
        }

        #[test]
        fn missing_calendar_name() {
            let ics = wrap(
                "BEGIN:VEVENT\r\nUID:a\r\nDTSTART;VALUE=DATE:20250205\r\nEND:VEVENT\r\n",
            );
            let snapshot = parse_snapshot(&ics).unwrap();
            assert!(snapshot.calendar_name.is_none());
        }

        #[test]
        fn empty_calendar() {
            let snapshot = parse_snapshot(&wrap("")).unwrap();
            assert!(snapshot.is_empty());
        }

        #[test]
        fn keeps_document_order_and_duplicates() {
            let ics = wrap(
                "BEGIN:VEVENT\r\nUID:b\r\nDTSTART;VALUE=DATE:20250205\r\nSUMMARY:one\r\nEND:VEVENT\r\n\
                 BEGIN:VEVENT\r\nUID:a\r\nDTSTART;VALUE=DATE:20250205\r\nEND:VEVENT\r\n\
                 BEGIN:VEVENT\r\nUID:b\r\nDTSTART;VALUE=DATE:20250205\r\nSUMMARY:two\r\nEND:VEVENT\r\n",
            );
            let snapshot = parse_snapshot(&ics).unwrap();

            let uids: Vec<_> = snapshot.events.iter().map(|e| e.uid.as_str()).collect();
            assert_eq!(uids, ["b", "a", "b"]);
            assert_eq!(snapshot.get("b").unwrap().summary.as_deref(), Some("two"));
        }

        #[test]
        fn ignores_other_components() {
            let ics = wrap(
                "BEGIN:VTODO\r\nUID:todo\r\nSUMMARY:Chore\r\nEND:VTODO\r\n\
                 BEGIN:VEVENT\r\nUID:a\r\nDTSTART;VALUE=DATE:20250205\r\nEND:VEVENT\r\n",
            );
            let snapshot = parse_snapshot(&ics).unwrap();
            assert_eq!(snapshot.len(), 1);
            assert_eq!(snapshot.events[0].uid, "a");
        }

        #[test]
        fn bytes_with_bom() {
            let mut bytes = "\u{feff}".as_bytes().to_vec();
            bytes.extend_from_slice(sample_ics().as_bytes());
            let snapshot = parse_snapshot_bytes(&bytes).unwrap();
            assert_eq!(snapshot.len(), 1);
        }
    }

    mod times {
        use super::*;

        fn start_of(dtstart: &str) -> RawEventTime {
            let ics = wrap(&format!(
                "BEGIN:VEVENT\r\nUID:a\r\n{}\r\nEND:VEVENT\r\n",
                dtstart
            ));
            parse_snapshot(&ics).unwrap().events.remove(0).start
        }

        #[test]
        fn date_value() {
            assert_eq!(
                start_of("DTSTART;VALUE=DATE:20250205"),
                RawEventTime::Date(sample_date())
            );
        }

        #[test]
        fn floating_value() {
            assert_eq!(
                start_of("DTSTART:20250205T100000"),
                RawEventTime::Floating(sample_date().and_hms_opt(10, 0, 0).unwrap())
            );
        }

        #[test]
        fn zoned_value() {
            assert_eq!(
                start_of("DTSTART;TZID=Europe/Berlin:20250205T100000"),
                RawEventTime::Zoned {
                    date_time: sample_date().and_hms_opt(10, 0, 0).unwrap(),
                    tzid: "Europe/Berlin".to_string(),
                }
            );
        }

        #[test]
        fn four_forms_are_distinct() {
            let forms = [
                start_of("DTSTART:20250205T100000Z"),
                start_of("DTSTART:20250205T100000"),
                start_of("DTSTART;TZID=Europe/Berlin:20250205T100000"),
                start_of("DTSTART;VALUE=DATE:20250205"),
            ];
            for (i, a) in forms.iter().enumerate() {
                for b in &forms[i + 1..] {
                    assert_ne!(a, b);
                }
            }
        }

        #[test]
        fn missing_end_is_none() {
            let ics = wrap("BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20250205T100000Z\r\nEND:VEVENT\r\n");
            assert!(parse_snapshot(&ics).unwrap().events[0].end.is_none());
        }
    }

    mod skipped {
        use super::*;

        #[test]
        fn event_without_uid() {
            let ics = wrap(
                "BEGIN:VEVENT\r\nDTSTART:20250205T100000Z\r\nSUMMARY:Ghost\r\nEND:VEVENT\r\n\
                 BEGIN:VEVENT\r\nUID:kept\r\nDTSTART:20250205T100000Z\r\nEND:VEVENT\r\n",
            );
            let snapshot = parse_snapshot(&ics).unwrap();
            assert_eq!(snapshot.len(), 1);
            assert_eq!(snapshot.events[0].uid, "kept");
        }

        #[test]
        fn event_without_start() {
            let ics = wrap("BEGIN:VEVENT\r\nUID:a\r\nSUMMARY:No start\r\nEND:VEVENT\r\n");
            assert!(parse_snapshot(&ics).unwrap().is_empty());
        }
    }

    mod malformed {
        use super::*;

        #[test]
        fn plain_text_is_rejected() {
            let err = parse_snapshot("this is not a calendar").unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::ParseError);
        }

        #[test]
        fn html_error_page_is_rejected() {
            let err = parse_snapshot_bytes(b"<html><body>502 Bad Gateway</body></html>").unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::ParseError);
        }

        #[test]
        fn empty_body_is_rejected() {
            assert!(parse_snapshot_bytes(b"").is_err());
        }
    }

    mod text {
        use super::*;

        #[test]
        fn unescapes_values() {
            assert_eq!(unescape_text(r"Room 3\, Floor 2\; East"), "Room 3, Floor 2; East");
            assert_eq!(unescape_text(r"Line\nbreak"), "Line\nbreak");
            assert_eq!(unescape_text(r"back\\slash"), r"back\slash");
            assert_eq!(unescape_text("trailing\\"), "trailing\\");
        }

        #[test]
        fn folded_summary() {
            let ics = wrap(
                "BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20250205T100000Z\r\n\
                 SUMMARY:Quarterly planning\r\n  and review\r\nEND:VEVENT\r\n",
            );
            let snapshot = parse_snapshot(&ics).unwrap();
            assert_eq!(
                snapshot.events[0].summary.as_deref(),
                Some("Quarterly planning and review")
            );
        }
    }
}
