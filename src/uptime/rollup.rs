//! Day, week and month rollups of a bucket series.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use serde::Serialize;

use super::bucket::month_bounds;
use super::{hour_label, Bucket, RunScan, TimeZoneCalendar, UptimeError};

/// Cells in a month grid: six weeks of seven days.
pub const MONTH_GRID_CELLS: usize = 42;

/// Activity summary for one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub day_name: String,
    pub bucket_count: usize,
    pub online_minutes: i64,
    pub uptime_percentage: f64,
    pub online_session_count: usize,
    pub offline_session_count: usize,
    pub total_heartbeats: u64,
    /// More than half of the day's buckets were online.
    pub is_online_day: bool,
    /// Local hour with the most heartbeats, as `HH:00`.
    pub peak_activity_hour: Option<String>,
}

impl DaySummary {
    /// A zeroed summary for a day without data.
    pub fn empty(date: NaiveDate, calendar: &TimeZoneCalendar) -> Self {
        Self {
            date,
            day_name: calendar.day_name(date),
            bucket_count: 0,
            online_minutes: 0,
            uptime_percentage: 0.0,
            online_session_count: 0,
            offline_session_count: 0,
            total_heartbeats: 0,
            is_online_day: false,
            peak_activity_hour: None,
        }
    }

    fn from_day(date: NaiveDate, buckets: &[&Bucket], interval_minutes: i64, calendar: &TimeZoneCalendar) -> Self {
        let scan = RunScan::scan(buckets.iter().map(|b| b.is_online));
        let uptime_percentage = scan.uptime_percentage();

        let mut hourly = [0u64; 24];
        for bucket in buckets {
            hourly[calendar.local_hour(bucket.start) as usize] += u64::from(bucket.heartbeat_count);
        }
        let total_heartbeats: u64 = hourly.iter().sum();

        Self {
            date,
            day_name: calendar.day_name(date),
            bucket_count: scan.total,
            online_minutes: scan.online as i64 * interval_minutes,
            uptime_percentage,
            online_session_count: scan.sessions,
            offline_session_count: scan.offline_runs,
            total_heartbeats,
            is_online_day: uptime_percentage > 50.0,
            peak_activity_hour: peak_hour(&hourly).map(hour_label),
        }
    }
}

/// Group buckets by local date, oldest first.
pub fn summarize_days(buckets: &[Bucket], interval_minutes: i64, calendar: &TimeZoneCalendar) -> Vec<DaySummary> {
    let mut days: BTreeMap<NaiveDate, Vec<&Bucket>> = BTreeMap::new();
    for bucket in buckets {
        days.entry(calendar.local_date(bucket.start)).or_default().push(bucket);
    }

    days.into_iter()
        .map(|(date, day)| DaySummary::from_day(date, &day, interval_minutes, calendar))
        .collect()
}

/// The most recent seven days up to and including `today`.
///
/// Days after `today` (clock skew) are never shown.
pub fn week_days(summaries: Vec<DaySummary>, today: NaiveDate) -> Vec<DaySummary> {
    let mut days: Vec<DaySummary> = summaries.into_iter().filter(|d| d.date <= today).collect();
    days.sort_by_key(|d| d.date);
    let skip = days.len().saturating_sub(7);
    days.split_off(skip)
}

/// One cell of a month calendar grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthDayData {
    pub day_of_month: u32,
    pub is_current_month: bool,
    pub is_today: bool,
    #[serde(flatten)]
    pub summary: DaySummary,
}

/// Lay day summaries onto a 42-cell grid starting at the Sunday on or
/// before the first of the month.
///
/// Cells outside the month always carry zeroed stats.
pub fn month_grid(
    summaries: &[DaySummary],
    year: i32,
    month: u32,
    today: NaiveDate,
    calendar: &TimeZoneCalendar,
) -> Result<Vec<MonthDayData>, UptimeError> {
    let (first, _) = month_bounds(year, month)?;
    let lead = i64::from(first.weekday().num_days_from_sunday());
    let grid_start = first
        .checked_sub_signed(ChronoDuration::days(lead))
        .ok_or_else(|| UptimeError::InvalidWindow(format!("month {}-{:02} is out of range", year, month)))?;

    let by_date: HashMap<NaiveDate, &DaySummary> = summaries.iter().map(|d| (d.date, d)).collect();

    let cells: Vec<MonthDayData> = grid_start
        .iter_days()
        .take(MONTH_GRID_CELLS)
        .map(|date| {
            let is_current_month = date.year() == year && date.month() == month;
            let summary = match by_date.get(&date) {
                Some(day) if is_current_month => (*day).clone(),
                _ => DaySummary::empty(date, calendar),
            };

            MonthDayData {
                day_of_month: date.day(),
                is_current_month,
                is_today: is_current_month && date == today,
                summary,
            }
        })
        .collect();

    if cells.len() != MONTH_GRID_CELLS {
        return Err(UptimeError::InvalidWindow(format!(
            "month {}-{:02} is out of range",
            year, month
        )));
    }
    Ok(cells)
}

/// Hour with the most heartbeats; `None` when there are none.
fn peak_hour(hourly: &[u64; 24]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (hour, &count) in hourly.iter().enumerate() {
        if count > 0 && best.map_or(true, |b| count > hourly[b]) {
            best = Some(hour);
        }
    }
    best
}
