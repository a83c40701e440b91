//! Bucket boundary generation and window selection.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{HeartbeatRecord, TimeZoneCalendar, UptimeError};

/// Upper bound on buckets per window.
pub const MAX_BUCKETS: i64 = 100_000;

/// Interval widths accepted at the request boundary, in minutes.
pub const SUPPORTED_INTERVALS: [i64; 5] = [5, 15, 30, 60, 120];

/// Default interval for timeline views.
pub const DEFAULT_INTERVAL_MINUTES: i64 = 5;

/// Default interval for week and month views.
pub const CALENDAR_INTERVAL_MINUTES: i64 = 15;

/// A validated half-open window `[start, end)` split into fixed-width buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval_minutes: i64,
}

impl BucketWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, interval_minutes: i64) -> Result<Self, UptimeError> {
        bucket_count(start, end, interval_minutes)?;
        Ok(Self {
            start,
            end,
            interval_minutes,
        })
    }

    pub fn interval(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.interval_minutes)
    }

    pub fn bucket_count(&self) -> usize {
        bucket_count(self.start, self.end, self.interval_minutes).map_or(0, |n| n as usize)
    }

    /// Start instants of every bucket, in order.
    pub fn bucket_starts(&self) -> Vec<DateTime<Utc>> {
        (0..self.bucket_count() as i64)
            .map(|k| self.start + ChronoDuration::minutes(self.interval_minutes * k))
            .collect()
    }

    /// End of the bucket starting at `start`; the last bucket may be partial.
    pub fn bucket_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start
            .checked_add_signed(self.interval())
            .map_or(self.end, |end| end.min(self.end))
    }
}

/// Number of buckets covering `[start, end)`, i.e. `ceil((end - start) / interval)`.
pub fn bucket_count(start: DateTime<Utc>, end: DateTime<Utc>, interval_minutes: i64) -> Result<i64, UptimeError> {
    if interval_minutes <= 0 {
        return Err(UptimeError::InvalidWindow(format!(
            "interval must be positive, got {} minutes",
            interval_minutes
        )));
    }

    if end <= start {
        return Err(UptimeError::InvalidWindow(format!(
            "window end {} is not after start {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }

    let step_ms = interval_minutes.checked_mul(60_000).ok_or_else(|| {
        UptimeError::InvalidWindow(format!("interval of {} minutes is too large", interval_minutes))
    })?;
    let span_ms = (end - start).num_milliseconds();

    let count = (span_ms / step_ms + i64::from(span_ms % step_ms != 0)).max(1);
    if count > MAX_BUCKETS {
        return Err(UptimeError::WindowTooLarge {
            buckets: count,
            max: MAX_BUCKETS,
        });
    }

    Ok(count)
}

/// Ordered bucket start instants for `[start, end)`.
pub fn bucket_starts(start: DateTime<Utc>, end: DateTime<Utc>, interval_minutes: i64) -> Result<Vec<DateTime<Utc>>, UptimeError> {
    Ok(BucketWindow::new(start, end, interval_minutes)?.bucket_starts())
}

/// Reject interval widths outside [`SUPPORTED_INTERVALS`].
pub fn validate_interval(interval_minutes: i64) -> Result<i64, UptimeError> {
    if SUPPORTED_INTERVALS.contains(&interval_minutes) {
        Ok(interval_minutes)
    } else {
        Err(UptimeError::InvalidWindow(format!(
            "unsupported interval {} minutes, expected one of {:?}",
            interval_minutes, SUPPORTED_INTERVALS
        )))
    }
}

/// Truncate a datetime to the start of its containing interval.
///
/// Boundaries are aligned to the Unix epoch.
pub fn truncate_to_interval(dt: DateTime<Utc>, interval_minutes: i64) -> DateTime<Utc> {
    let step = interval_minutes.max(1).saturating_mul(60);
    let ts = dt.timestamp();
    let truncated = ts - ts.rem_euclid(step);
    DateTime::from_timestamp(truncated, 0).unwrap_or(dt)
}

/// Round a datetime up to the next interval boundary (unchanged if already on one).
pub fn ceil_to_interval(dt: DateTime<Utc>, interval_minutes: i64) -> DateTime<Utc> {
    let truncated = truncate_to_interval(dt, interval_minutes);
    if truncated == dt {
        dt
    } else {
        truncated
            .checked_add_signed(ChronoDuration::minutes(interval_minutes))
            .unwrap_or(dt)
    }
}

/// How the caller wants the timeline window chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowMode {
    /// The last 24 hours up to now.
    #[default]
    #[serde(rename = "rolling24h", alias = "24h")]
    Rolling24h,
    /// Explicit calendar dates, or the extent of the data when none are given.
    #[serde(rename = "fixed_range", alias = "fixedRange")]
    FixedRange,
}

/// Caller-facing window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRequest {
    pub mode: WindowMode,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub interval_minutes: i64,
}

impl WindowRequest {
    pub fn rolling(interval_minutes: i64) -> Self {
        Self {
            mode: WindowMode::Rolling24h,
            start_date: None,
            end_date: None,
            interval_minutes,
        }
    }

    pub fn fixed(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>, interval_minutes: i64) -> Self {
        Self {
            mode: WindowMode::FixedRange,
            start_date,
            end_date,
            interval_minutes,
        }
    }

    /// Whether resolving this request needs the extent of the device's data.
    pub fn needs_extent(&self) -> bool {
        self.mode == WindowMode::FixedRange && self.start_date.is_none() && self.end_date.is_none()
    }

    /// Resolve into a concrete window.
    ///
    /// `extent` is the (earliest, latest) heartbeat time and is only
    /// consulted for a fixed range without dates.
    pub fn resolve(
        &self,
        calendar: &TimeZoneCalendar,
        now: DateTime<Utc>,
        extent: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<BucketWindow, UptimeError> {
        match self.mode {
            WindowMode::Rolling24h => rolling_window(now, self.interval_minutes),
            WindowMode::FixedRange if self.needs_extent() => {
                let (earliest, latest) = extent.ok_or_else(|| {
                    UptimeError::InvalidWindow("no heartbeats to derive a window from".to_string())
                })?;
                extent_window(earliest, latest, self.interval_minutes)
            }
            WindowMode::FixedRange => {
                let end_date = self.end_date.unwrap_or_else(|| calendar.today(now));
                let start_date = self.start_date.unwrap_or(end_date);
                dates_window(calendar, start_date, end_date, self.interval_minutes)
            }
        }
    }
}

/// Rolling 24-hour window ending at `now` rounded up to an interval boundary.
pub fn rolling_window(now: DateTime<Utc>, interval_minutes: i64) -> Result<BucketWindow, UptimeError> {
    if interval_minutes <= 0 {
        return Err(UptimeError::InvalidWindow(format!(
            "interval must be positive, got {} minutes",
            interval_minutes
        )));
    }
    let end = ceil_to_interval(now, interval_minutes);
    let start = truncate_to_interval(end - ChronoDuration::hours(24), interval_minutes);
    BucketWindow::new(start, end, interval_minutes)
}

/// Whole local days from `start_date` through `end_date` inclusive.
pub fn dates_window(
    calendar: &TimeZoneCalendar,
    start_date: NaiveDate,
    end_date: NaiveDate,
    interval_minutes: i64,
) -> Result<BucketWindow, UptimeError> {
    if end_date < start_date {
        return Err(UptimeError::InvalidWindow(format!(
            "end date {} is before start date {}",
            end_date, start_date
        )));
    }
    let after_end = end_date
        .succ_opt()
        .ok_or_else(|| UptimeError::InvalidWindow(format!("end date {} is out of range", end_date)))?;

    BucketWindow::new(
        calendar.start_of_date(start_date),
        calendar.start_of_date(after_end),
        interval_minutes,
    )
}

/// Data extent rounded outward so both the earliest and latest heartbeat are covered.
pub fn extent_window(
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
    interval_minutes: i64,
) -> Result<BucketWindow, UptimeError> {
    if interval_minutes <= 0 {
        return Err(UptimeError::InvalidWindow(format!(
            "interval must be positive, got {} minutes",
            interval_minutes
        )));
    }
    let start = truncate_to_interval(earliest, interval_minutes);
    let end = truncate_to_interval(latest, interval_minutes) + ChronoDuration::minutes(interval_minutes);
    BucketWindow::new(start, end, interval_minutes)
}

/// Earliest and latest timestamp in a heartbeat list.
pub fn heartbeat_extent(heartbeats: &[HeartbeatRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let earliest = heartbeats.iter().map(|h| h.timestamp).min()?;
    let latest = heartbeats.iter().map(|h| h.timestamp).max()?;
    Some((earliest, latest))
}

/// The seven local days up to and including today, clipped at `now`.
pub fn week_window(
    calendar: &TimeZoneCalendar,
    now: DateTime<Utc>,
    interval_minutes: i64,
) -> Result<BucketWindow, UptimeError> {
    let today = calendar.today(now);
    let first = today - ChronoDuration::days(6);
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| UptimeError::InvalidWindow(format!("date {} is out of range", today)))?;

    let start = calendar.start_of_date(first);
    let end = calendar
        .start_of_date(tomorrow)
        .min(ceil_to_interval(now, interval_minutes.max(1)));

    BucketWindow::new(start, end, interval_minutes)
}

/// The local calendar month, clipped at `now`.
///
/// Returns `None` when the month lies entirely in the future.
pub fn month_window(
    calendar: &TimeZoneCalendar,
    year: i32,
    month: u32,
    now: DateTime<Utc>,
    interval_minutes: i64,
) -> Result<Option<BucketWindow>, UptimeError> {
    let (first, next_first) = month_bounds(year, month)?;

    let start = calendar.start_of_date(first);
    let end = calendar
        .start_of_date(next_first)
        .min(ceil_to_interval(now, interval_minutes.max(1)));

    if end <= start {
        return Ok(None);
    }
    BucketWindow::new(start, end, interval_minutes).map(Some)
}

/// First day of the month and first day of the following month.
pub(crate) fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), UptimeError> {
    let invalid = || UptimeError::InvalidWindow(format!("invalid month {}-{:02}", year, month));

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;

    // Grid padding and UTC offsets reach up to a week past either bound.
    let slack = ChronoDuration::days(7);
    if first.checked_sub_signed(slack).is_none() || next_first.checked_add_signed(slack).is_none() {
        return Err(invalid());
    }

    Ok((first, next_first))
}
