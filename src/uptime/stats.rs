//! Aggregate uptime statistics over a bucket series.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{round2, Bucket};

/// Result of one left-to-right pass over online/offline states.
///
/// A session is a maximal run of online states; the scan starts out offline,
/// so a series that opens online counts that opening run as a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunScan {
    pub total: usize,
    pub online: usize,
    pub sessions: usize,
    pub offline_runs: usize,
    pub longest_online_run: usize,
    pub longest_offline_run: usize,
}

impl RunScan {
    pub fn scan<I>(states: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut scan = Self::default();
        let mut previous: Option<bool> = None;
        let mut online_run = 0;
        let mut offline_run = 0;

        for is_online in states {
            scan.total += 1;

            if is_online {
                if previous != Some(true) {
                    scan.sessions += 1;
                    scan.longest_offline_run = scan.longest_offline_run.max(offline_run);
                    offline_run = 0;
                }
                scan.online += 1;
                online_run += 1;
            } else {
                if previous != Some(false) {
                    scan.offline_runs += 1;
                    scan.longest_online_run = scan.longest_online_run.max(online_run);
                    online_run = 0;
                }
                offline_run += 1;
            }

            previous = Some(is_online);
        }

        // Close whichever run reaches the end of the series.
        scan.longest_online_run = scan.longest_online_run.max(online_run);
        scan.longest_offline_run = scan.longest_offline_run.max(offline_run);
        scan
    }

    /// Share of online states, 0..=100, rounded to 2 decimals.
    pub fn uptime_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            round2(self.online as f64 / self.total as f64 * 100.0)
        }
    }
}

/// Aggregate statistics for a bucket series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UptimeStats {
    pub total_online_minutes: i64,
    pub uptime_percentage: f64,
    pub session_count: usize,
    pub average_session_minutes: f64,
    pub longest_session_minutes: i64,
    pub longest_offline_minutes: i64,
    pub first_online_bucket_time: Option<DateTime<Utc>>,
    pub last_online_bucket_time: Option<DateTime<Utc>>,
}

impl UptimeStats {
    /// Compute statistics from scratch; an empty series yields all zeros.
    pub fn from_buckets(buckets: &[Bucket], interval_minutes: i64) -> Self {
        if buckets.is_empty() {
            return Self::default();
        }

        let scan = RunScan::scan(buckets.iter().map(|b| b.is_online));
        let total_online_minutes = scan.online as i64 * interval_minutes;

        Self {
            total_online_minutes,
            uptime_percentage: scan.uptime_percentage(),
            session_count: scan.sessions,
            average_session_minutes: average_session_minutes(total_online_minutes, scan.sessions),
            longest_session_minutes: scan.longest_online_run as i64 * interval_minutes,
            longest_offline_minutes: scan.longest_offline_run as i64 * interval_minutes,
            first_online_bucket_time: buckets.iter().find(|b| b.is_online).map(|b| b.start),
            last_online_bucket_time: buckets.iter().rfind(|b| b.is_online).map(|b| b.start),
        }
    }
}

pub(crate) fn average_session_minutes(total_online_minutes: i64, sessions: usize) -> f64 {
    if sessions == 0 {
        0.0
    } else {
        round2(total_online_minutes as f64 / sessions as f64)
    }
}
