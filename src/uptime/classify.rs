//! Per-bucket online/offline classification.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use super::{round2, Bucket, BucketWindow, HeartbeatIndex, HeartbeatRecord, TimeZoneCalendar};

/// Default look-back after the last heartbeat, in minutes.
pub const DEFAULT_GRACE_MINUTES: i64 = 3;

/// Upper bound accepted for the grace window.
pub const MAX_GRACE_MINUTES: i64 = 24 * 60;

/// Decides whether a device was online during a bucket.
///
/// A bucket is online if it holds at least one heartbeat, or if the most
/// recent heartbeat before its start is no older than the grace window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnlineStateClassifier {
    grace: ChronoDuration,
}

impl Default for OnlineStateClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_MINUTES)
    }
}

impl OnlineStateClassifier {
    pub fn new(grace_minutes: i64) -> Self {
        Self {
            grace: ChronoDuration::minutes(grace_minutes.clamp(0, MAX_GRACE_MINUTES)),
        }
    }

    pub fn grace(&self) -> ChronoDuration {
        self.grace
    }

    /// Classify one bucket starting at `start`.
    ///
    /// `prev_is_online` and `display_time` are left unset.
    pub fn classify(
        &self,
        start: DateTime<Utc>,
        in_bucket: &[HeartbeatRecord],
        previous: Option<&HeartbeatRecord>,
    ) -> Bucket {
        if !in_bucket.is_empty() {
            return Bucket {
                avg_battery: average(in_bucket.iter().filter_map(|r| r.battery_level)),
                avg_cpu: average(in_bucket.iter().filter_map(|r| r.cpu_usage)),
                heartbeat_count: saturating_count(in_bucket.len()),
                ..Bucket::empty(start, true)
            };
        }

        // Still warm from a recent ping: online, but no samples to average.
        let warm = previous.is_some_and(|hb| hb.timestamp < start && start - hb.timestamp <= self.grace);
        Bucket::empty(start, warm)
    }

    /// Classify every bucket of `window`, then link `prev_is_online`.
    pub fn classify_series(
        &self,
        index: &HeartbeatIndex,
        window: &BucketWindow,
        calendar: &TimeZoneCalendar,
    ) -> Vec<Bucket> {
        let mut cursor = index.cursor();

        let mut buckets: Vec<Bucket> = window
            .bucket_starts()
            .into_iter()
            .map(|start| {
                let (in_bucket, previous) = cursor.window(start, window.bucket_end(start));
                Bucket {
                    display_time: calendar.display_time(start),
                    ..self.classify(start, in_bucket, previous)
                }
            })
            .collect();

        link_previous(&mut buckets);
        buckets
    }
}

/// Heartbeat count clamped to the width of `Bucket::heartbeat_count`.
fn saturating_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Fill each bucket's `prev_is_online` from the bucket before it.
pub fn link_previous(buckets: &mut [Bucket]) {
    let mut previous = None;
    for bucket in buckets.iter_mut() {
        bucket.prev_is_online = previous;
        previous = Some(bucket.is_online);
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        round2(sum / count as f64)
    }
}
