//! Behavioural patterns derived from a bucket series.

use serde::Serialize;

use super::stats::average_session_minutes;
use super::{hour_label, round2, Bucket, RunScan, TimeZoneCalendar};

/// Hourly activity and flapping heuristics for one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DevicePatterns {
    /// Local hour with the most online buckets, as `HH:00`.
    pub most_active_hour: Option<String>,
    /// Local hour with the fewest online buckets, as `HH:00`.
    pub least_active_hour: Option<String>,
    pub average_session_minutes: f64,
    pub offline_sessions_per_hour: f64,
    /// 0..=100; penalizes frequent reconnects rather than raw downtime.
    pub reliability_score: f64,
    pub hourly_online_buckets: [u32; 24],
}

impl DevicePatterns {
    pub fn from_buckets(buckets: &[Bucket], interval_minutes: i64, calendar: &TimeZoneCalendar) -> Self {
        if buckets.is_empty() {
            return Self::default();
        }

        let mut hourly = [0u32; 24];
        for bucket in buckets.iter().filter(|b| b.is_online) {
            hourly[calendar.local_hour(bucket.start) as usize] += 1;
        }

        let scan = RunScan::scan(buckets.iter().map(|b| b.is_online));
        let total_online_minutes = scan.online as i64 * interval_minutes;

        let hours_covered = (scan.total as i64 * interval_minutes) as f64 / 60.0;
        let per_hour = if hours_covered > 0.0 {
            scan.sessions as f64 / hours_covered
        } else {
            0.0
        };

        Self {
            most_active_hour: Some(hour_label(argmax(&hourly))),
            least_active_hour: Some(hour_label(argmin(&hourly))),
            average_session_minutes: average_session_minutes(total_online_minutes, scan.sessions),
            offline_sessions_per_hour: round2(per_hour),
            reliability_score: round2((100.0 - per_hour * 10.0).max(0.0)),
            hourly_online_buckets: hourly,
        }
    }
}

/// Index of the largest value; ties go to the earliest hour.
fn argmax(values: &[u32; 24]) -> usize {
    let mut best = 0;
    for (hour, &count) in values.iter().enumerate() {
        if count > values[best] {
            best = hour;
        }
    }
    best
}

/// Index of the smallest value; ties go to the earliest hour.
fn argmin(values: &[u32; 24]) -> usize {
    let mut best = 0;
    for (hour, &count) in values.iter().enumerate() {
        if count < values[best] {
            best = hour;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

    fn day_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn day_of_buckets(online: impl Fn(usize) -> bool) -> Vec<Bucket> {
        (0..96)
            .map(|k| Bucket::empty(day_start() + ChronoDuration::minutes(15 * k as i64), online(k)))
            .collect()
    }

    #[test]
    fn test_histogram_and_hours() {
        let utc = TimeZoneCalendar::new(chrono_tz::UTC);
        // Online 08:00-12:00, plus a single bucket at 14:00.
        let buckets = day_of_buckets(|k| (32..48).contains(&k) || k == 56);
        let patterns = DevicePatterns::from_buckets(&buckets, 15, &utc);

        assert_eq!(patterns.hourly_online_buckets[8], 4);
        assert_eq!(patterns.hourly_online_buckets[14], 1);
        assert_eq!(patterns.most_active_hour.as_deref(), Some("08:00"));
        assert_eq!(patterns.least_active_hour.as_deref(), Some("00:00"));
        assert_eq!(patterns.average_session_minutes, 127.5);
        // 2 sessions over 24 hours.
        assert_eq!(patterns.offline_sessions_per_hour, 0.08);
        assert_eq!(patterns.reliability_score, 99.17);
    }

    #[test]
    fn test_hours_follow_calendar_timezone() {
        let la = TimeZoneCalendar::new(chrono_tz::America::Los_Angeles);
        // 08:00-09:00 UTC is midnight PST.
        let buckets = day_of_buckets(|k| (32..36).contains(&k));
        let patterns = DevicePatterns::from_buckets(&buckets, 15, &la);
        assert_eq!(patterns.most_active_hour.as_deref(), Some("00:00"));
        assert_eq!(patterns.least_active_hour.as_deref(), Some("01:00"));
    }

    #[test]
    fn test_flapping_lowers_reliability() {
        let utc = TimeZoneCalendar::new(chrono_tz::UTC);
        let buckets: Vec<_> = (0..24)
            .map(|k| Bucket::empty(day_start() + ChronoDuration::minutes(5 * k as i64), k % 2 == 0))
            .collect();
        let patterns = DevicePatterns::from_buckets(&buckets, 5, &utc);

        // 12 sessions in 2 hours.
        assert_eq!(patterns.offline_sessions_per_hour, 6.0);
        assert_eq!(patterns.reliability_score, 40.0);

        // One session in five minutes is 12 per hour; the score floors at zero.
        let single = vec![Bucket::empty(day_start(), true)];
        assert_eq!(DevicePatterns::from_buckets(&single, 5, &utc).reliability_score, 0.0);
    }

    #[test]
    fn test_empty_series() {
        let utc = TimeZoneCalendar::new(chrono_tz::UTC);
        let patterns = DevicePatterns::from_buckets(&[], 15, &utc);
        assert_eq!(patterns, DevicePatterns::default());
        assert!(patterns.most_active_hour.is_none());
    }
}
