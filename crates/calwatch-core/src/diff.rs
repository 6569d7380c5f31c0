//! Snapshot comparison.
//!
//! Events are matched by UID. Shared events are compared on the raw values of
//! four properties, so a value that was rewritten in a different form (for
//! example a floating time that became a UTC time) counts as a change even if
//! both forms denote the same instant.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::event::NormalizedEvent;
use crate::normalize::normalize_event;
use crate::raw_event::{RawEvent, Snapshot};
use crate::time::Localizer;

/// A compared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedField {
    Summary,
    Start,
    End,
    Location,
}

impl ChangedField {
    /// All compared fields, in comparison order.
    pub const ALL: [ChangedField; 4] = [Self::Summary, Self::Start, Self::End, Self::Location];

    /// Returns the iCalendar property name.
    pub fn property_name(self) -> &'static str {
        match self {
            Self::Summary => "SUMMARY",
            Self::Start => "DTSTART",
            Self::End => "DTEND",
            Self::Location => "LOCATION",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::Start => "Start",
            Self::End => "End",
            Self::Location => "Location",
        }
    }
}

impl fmt::Display for ChangedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event present in both snapshots whose compared fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedEvent {
    /// The new version, normalized.
    pub event: NormalizedEvent,
    /// The old version as parsed.
    pub previous: RawEvent,
    /// Never empty.
    pub changed_fields: Vec<ChangedField>,
}

/// The outcome of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    /// In the new snapshot's order.
    pub added: Vec<NormalizedEvent>,
    /// In the old snapshot's order.
    pub removed: Vec<NormalizedEvent>,
    /// In the new snapshot's order.
    pub modified: Vec<ModifiedEvent>,
}

impl DiffResult {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Returns the number of changed events.
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Returns the fields whose raw values differ, in comparison order.
///
/// Each difference is logged at debug level with both values.
pub fn changed_fields(old: &RawEvent, new: &RawEvent) -> Vec<ChangedField> {
    let mut changed = Vec::new();

    for field in ChangedField::ALL {
        let differs = match field {
            ChangedField::Summary => old.summary != new.summary,
            ChangedField::Start => old.start != new.start,
            ChangedField::End => old.end != new.end,
            ChangedField::Location => old.location != new.location,
        };
        if differs {
            log_change(&new.uid, field, old, new);
            changed.push(field);
        }
    }

    changed
}

fn log_change(uid: &str, field: ChangedField, old: &RawEvent, new: &RawEvent) {
    let (before, after) = match field {
        ChangedField::Summary => (format!("{:?}", old.summary), format!("{:?}", new.summary)),
        ChangedField::Start => (format!("{:?}", old.start), format!("{:?}", new.start)),
        ChangedField::End => (format!("{:?}", old.end), format!("{:?}", new.end)),
        ChangedField::Location => (format!("{:?}", old.location), format!("{:?}", new.location)),
    };
    debug!(
        uid,
        property = field.property_name(),
        old = %before,
        new = %after,
        "Field changed"
    );
}

/// UID lookup over a snapshot.
///
/// Keeps each UID at the position of its first occurrence while mapping it to
/// its last occurrence.
struct UidIndex<'a> {
    order: Vec<&'a str>,
    by_uid: HashMap<&'a str, &'a RawEvent>,
}

impl<'a> UidIndex<'a> {
    fn build(snapshot: &'a Snapshot) -> Self {
        let mut order = Vec::with_capacity(snapshot.len());
        let mut by_uid = HashMap::with_capacity(snapshot.len());

        for event in &snapshot.events {
            if by_uid.insert(event.uid.as_str(), event).is_none() {
                order.push(event.uid.as_str());
            }
        }

        Self { order, by_uid }
    }

    fn get(&self, uid: &str) -> Option<&'a RawEvent> {
        self.by_uid.get(uid).copied()
    }

    fn iter(&self) -> impl Iterator<Item = &'a RawEvent> + '_ {
        self.order.iter().filter_map(|uid| self.get(uid))
    }
}

/// Compares two snapshots.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot, localizer: &Localizer) -> DiffResult {
    let old_index = UidIndex::build(old);
    let new_index = UidIndex::build(new);
    let mut result = DiffResult::default();

    for event in new_index.iter() {
        match old_index.get(&event.uid) {
            None => result.added.push(normalize_event(event, localizer)),
            Some(previous) => {
                let changed = changed_fields(previous, event);
                if !changed.is_empty() {
                    result.modified.push(ModifiedEvent {
                        event: normalize_event(event, localizer),
                        previous: previous.clone(),
                        changed_fields: changed,
                    });
                }
            }
        }
    }

    for event in old_index.iter() {
        if new_index.get(&event.uid).is_none() {
            result.removed.push(normalize_event(event, localizer));
        }
    }

    debug!(
        added = result.added.len(),
        removed = result.removed.len(),
        modified = result.modified.len(),
        "Compared snapshots"
    );

    result
}
