//! SQLite heartbeat store implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use crate::uptime::{parse_timestamp, HeartbeatRecord};

/// Fixed-width UTC format; lexical order matches time order.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Where heartbeats come from.
///
/// The engine never fetches data itself; report assembly goes through this
/// trait so any backing store can feed it.
pub trait HeartbeatSource {
    /// Heartbeats for a device with `start <= time < end`, oldest first.
    fn fetch_heartbeats(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HeartbeatRecord>, DbError>;

    /// Earliest and latest heartbeat time for a device.
    fn heartbeat_extent(&self, device_id: &str) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, DbError>;
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // --- Heartbeats ---

    /// Add heartbeats in batch.
    pub fn add_heartbeats(&self, heartbeats: &[HeartbeatRecord]) -> Result<usize, DbError> {
        if heartbeats.is_empty() {
            return Ok(0);
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO heartbeats (device_id, time, battery_level, cpu_usage) VALUES (?1, ?2, ?3, ?4)",
            )?;

            for h in heartbeats {
                stmt.execute(params![
                    h.device_id,
                    h.timestamp.format(TIME_FORMAT).to_string(),
                    h.battery_level,
                    h.cpu_usage,
                ])?;
            }
        }

        tx.commit()?;
        Ok(heartbeats.len())
    }

    /// Get heartbeats for a device within a time range.
    ///
    /// Rows whose stored time cannot be parsed are skipped.
    pub fn get_heartbeats(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HeartbeatRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT device_id, time, battery_level, cpu_usage FROM heartbeats
             WHERE device_id = ?1 AND time >= ?2 AND time < ?3 ORDER BY time ASC, id ASC",
        )?;

        let rows = stmt
            .query_map(
                params![
                    device_id,
                    start.format(TIME_FORMAT).to_string(),
                    end.format(TIME_FORMAT).to_string(),
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                    ))
                },
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        let heartbeats = rows
            .into_iter()
            .filter_map(|(device_id, time, battery_level, cpu_usage)| match parse_timestamp(&time) {
                Some(timestamp) => Some(HeartbeatRecord {
                    device_id,
                    timestamp,
                    battery_level,
                    cpu_usage,
                }),
                None => {
                    tracing::warn!("Skipping heartbeat for {} with malformed time {:?}", device_id, time);
                    None
                }
            })
            .collect();

        Ok(heartbeats)
    }

    /// Get earliest and latest heartbeat time for a device.
    pub fn get_heartbeat_extent(&self, device_id: &str) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, DbError> {
        let conn = self.conn()?;
        let (min, max): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(time), MAX(time) FROM heartbeats WHERE device_id = ?1",
            params![device_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let earliest = min.and_then(|s| parse_timestamp(&s));
        let latest = max.and_then(|s| parse_timestamp(&s));
        Ok(earliest.zip(latest))
    }

    /// Get every known device with its latest heartbeat.
    pub fn get_devices(&self) -> Result<Vec<DeviceSummary>, DbError> {
        let conn = self.conn()?;
        // SQLite takes bare columns from the row that holds MAX(time).
        let mut stmt = conn.prepare(
            "SELECT device_id, MAX(time), battery_level, COUNT(*) FROM heartbeats
             GROUP BY device_id ORDER BY device_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        let devices = rows
            .into_iter()
            .filter_map(|(device_id, time, battery_level, heartbeat_count)| {
                let last_seen = parse_timestamp(&time)?;
                Some(DeviceSummary {
                    device_id,
                    last_seen,
                    battery_level,
                    heartbeat_count,
                })
            })
            .collect();

        Ok(devices)
    }

    /// Delete heartbeats before a cutoff time, returning the number removed.
    pub fn delete_heartbeats_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM heartbeats WHERE time < ?1",
            params![cutoff.format(TIME_FORMAT).to_string()],
        )?;
        Ok(deleted)
    }

    // --- Status ---

    /// Get database size in bytes.
    pub fn get_db_size_bytes(&self) -> Result<i64, DbError> {
        let conn = self.conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
        Ok(page_count * page_size)
    }

    /// Get storage statistics.
    pub fn get_stats(&self) -> Result<StoreStats, DbError> {
        let db_size_bytes = self.get_db_size_bytes()?;
        let conn = self.conn()?;
        let (heartbeat_count, device_count): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT device_id) FROM heartbeats",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        Ok(StoreStats {
            db_size_bytes,
            heartbeat_count,
            device_count,
        })
    }
}

impl HeartbeatSource for Store {
    fn fetch_heartbeats(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HeartbeatRecord>, DbError> {
        self.get_heartbeats(device_id, start, end)
    }

    fn heartbeat_extent(&self, device_id: &str) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, DbError> {
        self.get_heartbeat_extent(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn store() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_heartbeat_range_roundtrip() {
        let (_tmp, store) = store();
        let added = store
            .add_heartbeats(&[
                HeartbeatRecord::new("tab-1", at(10, 4)).with_battery(60.0),
                HeartbeatRecord::new("tab-1", at(10, 0)).with_battery(80.0).with_cpu(12.5),
                HeartbeatRecord::new("tab-2", at(10, 1)),
                HeartbeatRecord::new("tab-1", at(10, 10)),
            ])
            .unwrap();
        assert_eq!(added, 4);

        let fetched = store.fetch_heartbeats("tab-1", at(10, 0), at(10, 10)).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].timestamp, at(10, 0));
        assert_eq!(fetched[0].battery_level, Some(80.0));
        assert_eq!(fetched[0].cpu_usage, Some(12.5));
        assert_eq!(fetched[1].timestamp, at(10, 4));

        assert_eq!(store.heartbeat_extent("tab-1").unwrap(), Some((at(10, 0), at(10, 10))));
        assert_eq!(store.heartbeat_extent("nobody").unwrap(), None);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let (_tmp, store) = store();
        store.add_heartbeats(&[HeartbeatRecord::new("tab-1", at(10, 0))]).unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute(
                "INSERT INTO heartbeats (device_id, time) VALUES ('tab-1', '2024-01-01 10:02:xx')",
                [],
            )
            .unwrap();
        }

        let fetched = store.get_heartbeats("tab-1", at(9, 0), at(11, 0)).unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[test]
    fn test_devices_report_latest_battery() {
        let (_tmp, store) = store();
        store
            .add_heartbeats(&[
                HeartbeatRecord::new("tab-b", at(9, 0)).with_battery(30.0),
                HeartbeatRecord::new("tab-a", at(8, 0)).with_battery(90.0),
                HeartbeatRecord::new("tab-a", at(9, 30)).with_battery(85.0),
                HeartbeatRecord::new("tab-a", at(9, 10)).with_battery(88.0),
            ])
            .unwrap();

        let devices = store.get_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id, "tab-a");
        assert_eq!(devices[0].last_seen, at(9, 30));
        assert_eq!(devices[0].battery_level, Some(85.0));
        assert_eq!(devices[0].heartbeat_count, 3);
        assert_eq!(devices[1].device_id, "tab-b");
    }

    #[test]
    fn test_delete_before_and_stats() {
        let (_tmp, store) = store();
        store
            .add_heartbeats(&[
                HeartbeatRecord::new("tab-1", at(8, 0)),
                HeartbeatRecord::new("tab-1", at(9, 0)),
                HeartbeatRecord::new("tab-2", at(10, 0)),
            ])
            .unwrap();

        assert_eq!(store.delete_heartbeats_before(at(9, 0)).unwrap(), 1);

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.heartbeat_count, 2);
        assert_eq!(stats.device_count, 2);
        assert!(stats.db_size_bytes > 0);
    }
}
