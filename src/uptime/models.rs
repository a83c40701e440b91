//! Heartbeat and bucket value types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UptimeError;

/// A heartbeat as received on the wire, before timestamp parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHeartbeat {
    pub device_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub cpu_usage: Option<f64>,
}

/// A single timestamped device status ping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatRecord {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub battery_level: Option<f64>,
    pub cpu_usage: Option<f64>,
}

impl HeartbeatRecord {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            battery_level: None,
            cpu_usage: None,
        }
    }

    pub fn with_battery(mut self, level: f64) -> Self {
        self.battery_level = percentage(level);
        self
    }

    pub fn with_cpu(mut self, usage: f64) -> Self {
        self.cpu_usage = percentage(usage);
        self
    }
}

impl TryFrom<RawHeartbeat> for HeartbeatRecord {
    type Error = UptimeError;

    fn try_from(raw: RawHeartbeat) -> Result<Self, Self::Error> {
        if raw.device_id.trim().is_empty() {
            return Err(UptimeError::MalformedHeartbeat(
                "missing device id".to_string(),
            ));
        }

        let timestamp = parse_timestamp(&raw.timestamp).ok_or_else(|| {
            UptimeError::MalformedHeartbeat(format!(
                "unparseable timestamp {:?} for device {}",
                raw.timestamp, raw.device_id
            ))
        })?;

        Ok(Self {
            device_id: raw.device_id,
            timestamp,
            battery_level: raw.battery_level.and_then(percentage),
            cpu_usage: raw.cpu_usage.and_then(percentage),
        })
    }
}

/// Parse raw heartbeats, dropping the ones that fail.
///
/// Returns the parsed records and the number dropped.
pub fn parse_heartbeats<I>(raws: I) -> (Vec<HeartbeatRecord>, usize)
where
    I: IntoIterator<Item = RawHeartbeat>,
{
    let mut dropped = 0;
    let records = raws
        .into_iter()
        .filter_map(|raw| match HeartbeatRecord::try_from(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Dropping heartbeat: {}", e);
                dropped += 1;
                None
            }
        })
        .collect();

    (records, dropped)
}

/// Parse a heartbeat timestamp.
///
/// Accepts RFC 3339 and the naive `YYYY-MM-DD HH:MM:SS[.f]` forms, the latter
/// interpreted as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];

    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

fn percentage(value: f64) -> Option<f64> {
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}

/// A fixed-width time slot with a derived online/offline classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub is_online: bool,
    pub prev_is_online: Option<bool>,
    pub avg_battery: f64,
    pub avg_cpu: f64,
    pub heartbeat_count: u32,
    /// Bucket start as `HH:MM` in the engine's timezone.
    pub display_time: String,
}

impl Bucket {
    /// A bucket with no in-bucket samples.
    pub fn empty(start: DateTime<Utc>, is_online: bool) -> Self {
        Self {
            start,
            is_online,
            prev_is_online: None,
            avg_battery: 0.0,
            avg_cpu: 0.0,
            heartbeat_count: 0,
            display_time: String::new(),
        }
    }
}
