//! Raw calendar entries and snapshots.
//!
//! A [`RawEvent`] keeps the four compared properties exactly as they were
//! parsed from the feed, including how each time value was written. Two
//! values that denote the same instant but were written differently are
//! different values here; the differ relies on that.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A DTSTART/DTEND value as written in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawEventTime {
    /// `VALUE=DATE`: an all-day date.
    Date(NaiveDate),
    /// A local time without zone information.
    Floating(NaiveDateTime),
    /// A UTC time (`...Z`).
    Utc(DateTime<Utc>),
    /// A local time qualified with a `TZID` parameter.
    Zoned {
        /// The wall-clock time.
        date_time: NaiveDateTime,
        /// The zone identifier as written.
        tzid: String,
    },
}

impl RawEventTime {
    /// Returns true for date-only values.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns true if the value carries no zone information.
    pub fn is_naive(&self) -> bool {
        matches!(self, Self::Date(_) | Self::Floating(_))
    }
}

/// A VEVENT with the properties the overview tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// The event UID.
    pub uid: String,
    /// SUMMARY.
    pub summary: Option<String>,
    /// DTSTART.
    pub start: RawEventTime,
    /// DTEND.
    pub end: Option<RawEventTime>,
    /// LOCATION.
    pub location: Option<String>,
}

impl RawEvent {
    /// Creates an event with the required fields.
    pub fn new(uid: impl Into<String>, start: RawEventTime) -> Self {
        Self {
            uid: uid.into(),
            summary: None,
            start,
            end: None,
            location: None,
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the end time.
    pub fn with_end(mut self, end: RawEventTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// All events of one fetch of a calendar feed, in document order.
///
/// Duplicate UIDs are kept as parsed; lookups resolve them last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The `X-WR-CALNAME` of the document, if any.
    pub calendar_name: Option<String>,
    /// The events in document order.
    pub events: Vec<RawEvent>,
}

impl Snapshot {
    /// Creates a snapshot from events.
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            calendar_name: None,
            events,
        }
    }

    /// Builder method to set the calendar name.
    pub fn with_calendar_name(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = Some(name.into());
        self
    }

    /// Returns the number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the snapshot has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the event for `uid`, the last occurrence if duplicated.
    pub fn get(&self, uid: &str) -> Option<&RawEvent> {
        self.events.iter().rev().find(|e| e.uid == uid)
    }
}
