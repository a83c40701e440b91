//! Time-ordered heartbeat index.

use chrono::{DateTime, Utc};

use super::HeartbeatRecord;

/// Heartbeats sorted by timestamp for windowed lookups.
///
/// Sorting is stable, so records sharing a timestamp keep their input order.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatIndex {
    records: Vec<HeartbeatRecord>,
}

impl HeartbeatIndex {
    pub fn new(mut records: Vec<HeartbeatRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[HeartbeatRecord] {
        &self.records
    }

    /// Heartbeats with `start <= timestamp < end`.
    pub fn in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[HeartbeatRecord] {
        let lo = self.records.partition_point(|r| r.timestamp < start);
        let hi = self.records.partition_point(|r| r.timestamp < end);
        if hi <= lo {
            &[]
        } else {
            &self.records[lo..hi]
        }
    }

    /// The most recent heartbeat strictly before `instant`.
    pub fn last_before(&self, instant: DateTime<Utc>) -> Option<&HeartbeatRecord> {
        let idx = self.records.partition_point(|r| r.timestamp < instant);
        idx.checked_sub(1).map(|i| &self.records[i])
    }

    /// A forward-only cursor for scanning time-ordered buckets.
    pub fn cursor(&self) -> HeartbeatCursor<'_> {
        HeartbeatCursor {
            records: &self.records,
            pos: 0,
        }
    }
}

/// Single forward-advancing pointer over an index.
///
/// Successive calls to [`HeartbeatCursor::window`] must use non-decreasing
/// start instants; each heartbeat is then visited a bounded number of times,
/// making a full bucket scan O(buckets + heartbeats).
#[derive(Debug)]
pub struct HeartbeatCursor<'a> {
    records: &'a [HeartbeatRecord],
    pos: usize,
}

impl<'a> HeartbeatCursor<'a> {
    /// Heartbeats in `[start, end)` plus the last heartbeat strictly before `start`.
    pub fn window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (&'a [HeartbeatRecord], Option<&'a HeartbeatRecord>) {
        let records = self.records;

        while self.pos < records.len() && records[self.pos].timestamp < start {
            self.pos += 1;
        }
        let previous = self.pos.checked_sub(1).map(|i| &records[i]);

        let mut hi = self.pos;
        while hi < records.len() && records[hi].timestamp < end {
            hi += 1;
        }

        (&records[self.pos..hi], previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn index() -> HeartbeatIndex {
        HeartbeatIndex::new(vec![
            HeartbeatRecord::new("tab-1", at(10, 4)).with_battery(60.0),
            HeartbeatRecord::new("tab-1", at(10, 0)).with_battery(80.0),
            HeartbeatRecord::new("tab-1", at(10, 4)).with_battery(61.0),
            HeartbeatRecord::new("tab-1", at(10, 12)),
        ])
    }

    #[test]
    fn test_sorted_and_stable() {
        let idx = index();
        let batteries: Vec<_> = idx.records().iter().map(|r| r.battery_level).collect();
        assert_eq!(batteries, vec![Some(80.0), Some(60.0), Some(61.0), None]);
    }

    #[test]
    fn test_in_range() {
        let idx = index();
        assert_eq!(idx.in_range(at(10, 0), at(10, 5)).len(), 3);
        assert_eq!(idx.in_range(at(10, 5), at(10, 10)).len(), 0);
        assert_eq!(idx.in_range(at(10, 10), at(10, 15)).len(), 1);
        // End is exclusive.
        assert_eq!(idx.in_range(at(10, 0), at(10, 4)).len(), 1);
        assert_eq!(idx.in_range(at(10, 15), at(10, 10)).len(), 0);
    }

    #[test]
    fn test_last_before() {
        let idx = index();
        assert!(idx.last_before(at(10, 0)).is_none());
        assert_eq!(idx.last_before(at(10, 5)).map(|r| r.battery_level), Some(Some(61.0)));
        assert_eq!(idx.last_before(at(10, 4)).map(|r| r.timestamp), Some(at(10, 0)));
        assert_eq!(idx.last_before(at(23, 0)).map(|r| r.timestamp), Some(at(10, 12)));
    }

    #[test]
    fn test_cursor_matches_binary_search() {
        let idx = index();
        let mut cursor = idx.cursor();
        let mut start = at(9, 50);

        while start < at(10, 30) {
            let end = start + chrono::Duration::minutes(5);
            let (in_bucket, previous) = cursor.window(start, end);
            assert_eq!(in_bucket, idx.in_range(start, end));
            assert_eq!(previous, idx.last_before(start));
            start = end;
        }
    }
}
