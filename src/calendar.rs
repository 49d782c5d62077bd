//! Calendar-day bucketing under an explicit UTC offset.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

/// A calendar day in the configured offset. Serializes as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Human label relative to `today`: "Today", "Yesterday", or the long
    /// form "October 18, 2026".
    pub fn label(&self, today: DayKey) -> String {
        if *self == today {
            return "Today".to_string();
        }
        if today.0.checked_sub_days(Days::new(1)) == Some(self.0) {
            return "Yesterday".to_string();
        }
        self.0.format("%B %-d, %Y").to_string()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Maps millisecond timestamps to calendar days.
///
/// The offset is injected rather than read from the host so that bucketing
/// is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Day containing `timestamp_ms`. Timestamps outside chrono's range are
    /// bucketed onto the epoch day.
    pub fn day_of(&self, timestamp_ms: i64) -> DayKey {
        let utc = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_default();
        DayKey(utc.with_timezone(&self.offset).date_naive())
    }

    pub fn today(&self) -> DayKey {
        DayKey(Utc::now().with_timezone(&self.offset).date_naive())
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl FromStr for Calendar {
    type Err = chrono::ParseError;

    /// Parse an offset such as `+02:00` or `-05:30`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<FixedOffset>().map(Calendar::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    fn date(y: i32, m: u32, d: u32) -> DayKey {
        DayKey::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn utc_buckets_on_midnight() {
        let cal = Calendar::utc();
        assert_eq!(cal.day_of(0), date(1970, 1, 1));
        assert_eq!(cal.day_of(DAY_MS - 1), date(1970, 1, 1));
        assert_eq!(cal.day_of(DAY_MS), date(1970, 1, 2));
    }

    #[test]
    fn offset_shifts_day_boundary() {
        let plus_two: Calendar = "+02:00".parse().unwrap();
        // 23:00 UTC on day 0 is 01:00 on day 1 at +02:00.
        let ts = DAY_MS - 3_600_000;
        assert_eq!(Calendar::utc().day_of(ts), date(1970, 1, 1));
        assert_eq!(plus_two.day_of(ts), date(1970, 1, 2));

        let minus_five: Calendar = "-05:00".parse().unwrap();
        assert_eq!(minus_five.day_of(3_600_000), date(1969, 12, 31));
    }

    #[test]
    fn rejects_garbage_offset() {
        assert!("tomorrow".parse::<Calendar>().is_err());
    }

    #[test]
    fn labels_relative_to_today() {
        let today = date(2026, 10, 18);
        assert_eq!(today.label(today), "Today");
        assert_eq!(date(2026, 10, 17).label(today), "Yesterday");
        assert_eq!(date(2025, 3, 4).label(today), "March 4, 2025");
    }

    #[test]
    fn day_key_displays_iso_date() {
        assert_eq!(date(2026, 1, 5).to_string(), "2026-01-05");
        assert_eq!(
            serde_json::to_string(&date(2026, 1, 5)).unwrap(),
            "\"2026-01-05\""
        );
    }
}
