//! Timezone-aware calendar helpers.
//!
//! Every grouping by local day or local hour goes through
//! [`TimeZoneCalendar`]; offsets come from the IANA database, never from
//! hand-written arithmetic.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Converts instants to local calendar dates and hours in one timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeZoneCalendar {
    tz: Tz,
}

impl TimeZoneCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Look up an IANA timezone name such as `America/Los_Angeles`.
    pub fn from_name(name: &str) -> Option<Self> {
        name.trim().parse::<Tz>().ok().map(Self::new)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Local hour of day, 0..=23.
    pub fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.tz).hour()
    }

    pub fn start_of_local_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_date(self.local_date(instant))
    }

    /// First instant of a local calendar date.
    ///
    /// An ambiguous midnight resolves to the earlier instant. A midnight that
    /// falls inside a DST gap moves forward to the first valid local hour.
    pub fn start_of_date(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);

        (0..=3)
            .find_map(|h| {
                self.tz
                    .from_local_datetime(&(midnight + ChronoDuration::hours(h)))
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_date(now)
    }

    /// Short weekday name, e.g. `Mon`.
    pub fn day_name(&self, date: NaiveDate) -> String {
        date.format("%a").to_string()
    }

    /// Local wall-clock time as `HH:MM`.
    pub fn display_time(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.tz).format("%H:%M").to_string()
    }
}

/// Format an hour of day as `HH:00`.
pub fn hour_label(hour: usize) -> String {
    format!("{:02}:00", hour)
}
