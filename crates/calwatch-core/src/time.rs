//! Time zone localization and date formatting.
//!
//! [`Localizer`] attaches the configured IANA zone to naive calendar times and
//! converts zoned times back for display. [`DatePattern`] is a strftime
//! pattern validated once at startup so formatting never fails later.

use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta,
    TimeZone, Utc,
};
use chrono_tz::{OffsetComponents, Tz};

use crate::error::{CoreError, CoreResult};

/// Attaches `tz` to a naive local time.
///
/// Local times that occur twice (DST fall-back) resolve to the later,
/// standard-time instant. Local times that never occur (DST spring-forward)
/// take the zone's standard offset.
pub fn localize_in(tz: &Tz, naive: NaiveDateTime) -> DateTime<FixedOffset> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.fixed_offset(),
        LocalResult::Ambiguous(_, later) => later.fixed_offset(),
        LocalResult::None => {
            let standard = tz.offset_from_utc_datetime(&naive).base_utc_offset();
            let offset = i32::try_from(standard.num_seconds())
                .ok()
                .and_then(FixedOffset::east_opt)
                .unwrap_or_else(|| Utc.fix());
            let utc = naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
            DateTime::from_naive_utc_and_offset(utc, offset)
        }
    }
}

/// The configured local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Localizer {
    tz: Tz,
}

impl Localizer {
    /// Creates a localizer for the given zone.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parses an IANA identifier such as `Europe/Berlin`.
    pub fn parse(name: &str) -> CoreResult<Self> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| CoreError::InvalidTimezone(name.to_string()))
    }

    /// Returns the configured zone.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Attaches the configured zone to a naive local time.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<FixedOffset> {
        localize_in(&self.tz, naive)
    }

    /// Returns local midnight of `date` in the configured zone.
    pub fn local_midnight(&self, date: NaiveDate) -> DateTime<FixedOffset> {
        self.localize(NaiveDateTime::new(date, NaiveTime::MIN))
    }

    /// Converts a zoned time into the configured zone for display.
    pub fn to_local(&self, dt: &DateTime<FixedOffset>) -> DateTime<Tz> {
        dt.with_timezone(&self.tz)
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl fmt::Display for Localizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tz.name())
    }
}

/// A strftime pattern checked for invalid specifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    pattern: String,
}

impl DatePattern {
    /// Default pattern: day-first date and 24-hour time.
    pub const DEFAULT: &'static str = "%d.%m.%Y ⋅ %H:%M";

    /// Validates and wraps a pattern.
    pub fn new(pattern: impl Into<String>) -> CoreResult<Self> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(CoreError::InvalidDatePattern(pattern));
        }
        Ok(Self { pattern })
    }

    /// Returns the raw pattern.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Formats a zoned time.
    ///
    /// Falls back to RFC 3339 if the pattern asks for something the value
    /// cannot provide.
    pub fn format<Z>(&self, dt: &DateTime<Z>) -> String
    where
        Z: TimeZone,
        Z::Offset: fmt::Display,
    {
        let mut out = String::new();
        match write!(out, "{}", dt.format(&self.pattern)) {
            Ok(()) => out,
            Err(_) => dt.to_rfc3339(),
        }
    }
}

impl Default for DatePattern {
    fn default() -> Self {
        Self {
            pattern: Self::DEFAULT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn berlin() -> Localizer {
        Localizer::parse("Europe/Berlin").unwrap()
    }

    mod localizer {
        use super::*;

        #[test]
        fn parses_iana_names() {
            assert_eq!(berlin().to_string(), "Europe/Berlin");
            assert_eq!(
                Localizer::parse(" America/New_York ").unwrap().timezone(),
                Tz::America__New_York
            );
        }

        #[test]
        fn rejects_unknown_zone() {
            assert_eq!(
                Localizer::parse("Mars/Olympus"),
                Err(CoreError::InvalidTimezone("Mars/Olympus".to_string()))
            );
        }

        #[test]
        fn localizes_winter_and_summer_offsets() {
            let winter = berlin().localize(naive(2025, 2, 5, 10, 0));
            assert_eq!(winter.offset().local_minus_utc(), 3600);
            assert_eq!(winter.to_rfc3339(), "2025-02-05T10:00:00+01:00");

            let summer = berlin().localize(naive(2025, 7, 5, 10, 0));
            assert_eq!(summer.offset().local_minus_utc(), 7200);
        }

        #[test]
        fn ambiguous_time_takes_standard_offset() {
            let dt = berlin().localize(naive(2025, 10, 26, 2, 30));
            assert_eq!(dt.to_rfc3339(), "2025-10-26T02:30:00+01:00");
        }

        #[test]
        fn skipped_time_takes_standard_offset() {
            let dt = berlin().localize(naive(2025, 3, 30, 2, 30));
            assert_eq!(dt.to_rfc3339(), "2025-03-30T02:30:00+01:00");
        }

        #[test]
        fn local_midnight() {
            let d = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
            let dt = berlin().local_midnight(d);
            assert_eq!(dt.to_rfc3339(), "2025-02-10T00:00:00+01:00");
        }

        #[test]
        fn converts_back_to_local() {
            let utc = Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap().fixed_offset();
            let local = berlin().to_local(&utc);
            assert_eq!(local.format("%H:%M").to_string(), "10:00");
        }
    }

    mod date_pattern {
        use super::*;

        #[test]
        fn default_pattern_formats() {
            let dt = berlin().localize(naive(2025, 2, 5, 10, 0));
            assert_eq!(DatePattern::default().format(&dt), "05.02.2025 ⋅ 10:00");
        }

        #[test]
        fn custom_pattern_formats() {
            let pattern = DatePattern::new("%m/%d/%Y ⋅ %I:%M %p").unwrap();
            let dt = berlin().localize(naive(2025, 2, 5, 14, 30));
            assert_eq!(pattern.format(&dt), "02/05/2025 ⋅ 02:30 PM");
        }

        #[test]
        fn rejects_invalid_specifier() {
            assert!(matches!(
                DatePattern::new("%Y-%Q"),
                Err(CoreError::InvalidDatePattern(_))
            ));
        }
    }
}
