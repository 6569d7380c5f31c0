//! The normalized event used for display.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A timezone-resolved projection of a [`RawEvent`](crate::RawEvent).
///
/// `start` is always present; all-day dates have been expanded to local
/// midnight and naive times carry the configured zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// The event UID.
    pub uid: String,
    /// The event summary, if the feed provided one.
    pub summary: Option<String>,
    /// When the event starts.
    pub start: DateTime<FixedOffset>,
    /// When the event ends, if DTEND was present.
    pub end: Option<DateTime<FixedOffset>>,
    /// The event location, if any.
    pub location: Option<String>,
}

impl NormalizedEvent {
    /// Creates an event with the required fields.
    pub fn new(uid: impl Into<String>, start: DateTime<FixedOffset>) -> Self {
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
    pub fn with_end(mut self, end: DateTime<FixedOffset>) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
