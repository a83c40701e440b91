//! Engine facade: one call per view.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    month_grid, month_window, summarize_days, week_days, week_window, Bucket, BucketWindow, DaySummary,
    DevicePatterns, HeartbeatIndex, HeartbeatRecord, MonthDayData, OnlineStateClassifier, TimeZoneCalendar,
    UptimeError, UptimeStats, WindowRequest,
};

/// Timeline view: the bucket series with its statistics and patterns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub interval_minutes: i64,
    pub buckets: Vec<Bucket>,
    pub stats: UptimeStats,
    pub patterns: DevicePatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekReport {
    pub days: Vec<DaySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthReport {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<MonthDayData>,
}

/// Stateless entry point tying the calendar and classifier together.
///
/// Every call works on its own copy of the input, so one engine can serve
/// concurrent requests.
#[derive(Debug, Clone, Copy)]
pub struct UptimeEngine {
    calendar: TimeZoneCalendar,
    classifier: OnlineStateClassifier,
}

impl UptimeEngine {
    pub fn new(calendar: TimeZoneCalendar, grace_minutes: i64) -> Self {
        Self {
            calendar,
            classifier: OnlineStateClassifier::new(grace_minutes),
        }
    }

    pub fn calendar(&self) -> &TimeZoneCalendar {
        &self.calendar
    }

    pub fn classifier(&self) -> &OnlineStateClassifier {
        &self.classifier
    }

    pub fn resolve_window(
        &self,
        request: &WindowRequest,
        now: DateTime<Utc>,
        extent: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<BucketWindow, UptimeError> {
        request.resolve(&self.calendar, now, extent)
    }

    /// Classified bucket series for `window`.
    pub fn buckets(&self, heartbeats: Vec<HeartbeatRecord>, window: &BucketWindow) -> Vec<Bucket> {
        let index = HeartbeatIndex::new(heartbeats);
        self.classifier.classify_series(&index, window, &self.calendar)
    }

    pub fn timeline(&self, heartbeats: Vec<HeartbeatRecord>, window: &BucketWindow) -> TimelineReport {
        let buckets = self.buckets(heartbeats, window);
        let stats = UptimeStats::from_buckets(&buckets, window.interval_minutes);
        let patterns = DevicePatterns::from_buckets(&buckets, window.interval_minutes, &self.calendar);

        TimelineReport {
            window_start: window.start,
            window_end: window.end,
            interval_minutes: window.interval_minutes,
            buckets,
            stats,
            patterns,
        }
    }

    /// Day summaries for the seven local days ending today.
    pub fn week(
        &self,
        heartbeats: Vec<HeartbeatRecord>,
        now: DateTime<Utc>,
        interval_minutes: i64,
    ) -> Result<WeekReport, UptimeError> {
        let window = week_window(&self.calendar, now, interval_minutes)?;
        let buckets = self.buckets(heartbeats, &window);
        let summaries = summarize_days(&buckets, interval_minutes, &self.calendar);

        Ok(WeekReport {
            days: week_days(summaries, self.calendar.today(now)),
        })
    }

    /// 42-cell calendar grid for a local month.
    pub fn month(
        &self,
        heartbeats: Vec<HeartbeatRecord>,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
        interval_minutes: i64,
    ) -> Result<MonthReport, UptimeError> {
        let summaries = match month_window(&self.calendar, year, month, now, interval_minutes)? {
            Some(window) => {
                let buckets = self.buckets(heartbeats, &window);
                summarize_days(&buckets, interval_minutes, &self.calendar)
            }
            None => Vec::new(),
        };

        Ok(MonthReport {
            year,
            month,
            cells: month_grid(&summaries, year, month, self.calendar.today(now), &self.calendar)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uptime::{HeartbeatRecord, DEFAULT_GRACE_MINUTES};
    use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, TimeZone};

    fn engine() -> UptimeEngine {
        UptimeEngine::new(
            TimeZoneCalendar::new(chrono_tz::America::Los_Angeles),
            DEFAULT_GRACE_MINUTES,
        )
    }

    fn now() -> DateTime<Utc> {
        // 2024-01-15 10:07 PST
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 7, 0).unwrap()
    }

    fn steady(from: DateTime<Utc>, minutes: i64) -> Vec<HeartbeatRecord> {
        (0..minutes)
            .map(|m| HeartbeatRecord::new("tab-1", from + ChronoDuration::minutes(m)).with_battery(90.0))
            .collect()
    }

    #[test]
    fn test_rolling_with_no_heartbeats_is_offline_not_empty() {
        let engine = engine();
        let window = engine.resolve_window(&WindowRequest::rolling(5), now(), None).unwrap();
        let report = engine.timeline(Vec::new(), &window);

        assert_eq!(report.buckets.len(), 288);
        assert!(report.buckets.iter().all(|b| !b.is_online));
        assert_eq!(report.stats.uptime_percentage, 0.0);
        assert_eq!(report.stats.session_count, 0);
    }

    #[test]
    fn test_timeline_scenario() {
        let engine = engine();
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let window = BucketWindow::new(start, start + ChronoDuration::minutes(10), 5).unwrap();
        let heartbeats = vec![
            HeartbeatRecord::new("tab-1", start).with_battery(80.0),
            HeartbeatRecord::new("tab-1", start + ChronoDuration::minutes(4)).with_battery(60.0),
        ];

        let report = engine.timeline(heartbeats, &window);
        assert_eq!(report.buckets.len(), 2);
        assert_eq!(report.buckets[0].avg_battery, 70.0);
        assert!(report.buckets[1].is_online);
        assert_eq!(report.buckets[1].heartbeat_count, 0);
        assert_eq!(report.stats.uptime_percentage, 100.0);
        assert_eq!(report.stats.session_count, 1);
        assert_eq!(report.buckets[0].display_time, "02:00");
    }

    #[test]
    fn test_timeline_is_deterministic() {
        let engine = engine();
        let window = engine.resolve_window(&WindowRequest::rolling(15), now(), None).unwrap();
        let heartbeats = steady(now() - ChronoDuration::hours(5), 90);

        let first = serde_json::to_string(&engine.timeline(heartbeats.clone(), &window)).unwrap();
        let second = serde_json::to_string(&engine.timeline(heartbeats, &window)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_week_bucket_counts_cover_window() {
        let engine = engine();
        let heartbeats = steady(now() - ChronoDuration::days(2), 240);
        let report = engine.week(heartbeats, now(), 15).unwrap();

        let window = week_window(engine.calendar(), now(), 15).unwrap();
        let total: usize = report.days.iter().map(|d| d.bucket_count).sum();
        assert_eq!(report.days.len(), 7);
        assert_eq!(total, window.bucket_count());
        assert_eq!(report.days.last().map(|d| d.date), Some(engine.calendar().today(now())));

        let busy = report.days.iter().filter(|d| d.total_heartbeats > 0).count();
        assert_eq!(busy, 1);
    }

    #[test]
    fn test_month_report() {
        let engine = engine();
        let heartbeats = steady(now() - ChronoDuration::days(3), 600);
        let report = engine.month(heartbeats, 2024, 1, now(), 15).unwrap();

        assert_eq!(report.cells.len(), 42);
        assert_eq!(report.cells.iter().filter(|c| c.is_today).count(), 1);
        let jan_12 = report
            .cells
            .iter()
            .find(|c| c.is_current_month && c.day_of_month == 12)
            .unwrap();
        assert!(jan_12.summary.total_heartbeats > 0);

        let future = engine.month(Vec::new(), 2024, 3, now(), 15).unwrap();
        assert_eq!(future.cells.len(), 42);
        assert!(future.cells.iter().all(|c| !c.is_today && c.summary.bucket_count == 0));
    }

    #[test]
    fn test_month_at_date_extremes_is_invalid() {
        let engine = engine();
        for (year, month) in [(NaiveDate::MIN.year(), 1), (NaiveDate::MAX.year(), 12)] {
            let result = engine.month(Vec::new(), year, month, now(), 15);
            assert!(matches!(result, Err(UptimeError::InvalidWindow(_))));
        }
    }
}
