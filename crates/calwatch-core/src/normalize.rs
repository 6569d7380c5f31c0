//! RawEvent to NormalizedEvent conversion.
//!
//! The normalization process:
//! 1. Expands all-day dates to local midnight
//! 2. Attaches the configured zone to floating times
//! 3. Resolves `TZID`-qualified times in their own zone
//! 4. Copies summary and location unchanged

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::warn;

use crate::event::NormalizedEvent;
use crate::raw_event::{RawEvent, RawEventTime, Snapshot};
use crate::time::{Localizer, localize_in};

/// Converts a [`RawEvent`] to a [`NormalizedEvent`].
pub fn normalize_event(raw: &RawEvent, localizer: &Localizer) -> NormalizedEvent {
    NormalizedEvent {
        uid: raw.uid.clone(),
        summary: raw.summary.clone(),
        start: resolve_time(&raw.start, localizer),
        end: raw.end.as_ref().map(|end| resolve_time(end, localizer)),
        location: raw.location.clone(),
    }
}

/// Resolves a raw time value to a zoned timestamp.
///
/// Values that already carry zone information keep it. An unrecognized
/// `TZID` is treated like a floating time in the configured zone.
pub fn resolve_time(raw: &RawEventTime, localizer: &Localizer) -> DateTime<FixedOffset> {
    match raw {
        RawEventTime::Date(date) => localizer.local_midnight(*date),
        RawEventTime::Floating(naive) => localizer.localize(*naive),
        RawEventTime::Utc(dt) => dt.fixed_offset(),
        RawEventTime::Zoned { date_time, tzid } => match tzid.parse::<Tz>() {
            Ok(tz) => localize_in(&tz, *date_time),
            Err(_) => {
                warn!(tzid = %tzid, fallback = %localizer, "Unknown TZID, using configured zone");
                localizer.localize(*date_time)
            }
        },
    }
}

/// Normalizes every event of a snapshot, in document order.
pub fn normalize_snapshot(snapshot: &Snapshot, localizer: &Localizer) -> Vec<NormalizedEvent> {
    snapshot
        .events
        .iter()
        .map(|raw| normalize_event(raw, localizer))
        .collect()
}
