//! Database model types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latest known state of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub battery_level: Option<f64>,
    pub heartbeat_count: i64,
}

/// Storage statistics for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub db_size_bytes: i64,
    pub heartbeat_count: i64,
    pub device_count: i64,
}
