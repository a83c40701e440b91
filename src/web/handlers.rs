//! HTTP request handlers.

use super::reports::{month_report, timeline_report, week_report, ReportError};
use super::AppState;
use crate::db::DeviceSummary;
use crate::uptime::{
    parse_heartbeats, MonthReport, RawHeartbeat, TimelineReport, WeekReport, WindowMode, WindowRequest,
    CALENDAR_INTERVAL_MINUTES,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReportError::Window(_) => StatusCode::BAD_REQUEST,
            ReportError::Store(e) => {
                tracing::error!("Store error while building report: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

// ============================================================================
// API: Devices
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    #[serde(flatten)]
    pub device: DeviceSummary,
    /// Last heartbeat is within the grace window.
    pub is_online: bool,
}

pub async fn handle_get_devices(State(state): State<AppState>) -> impl IntoResponse {
    let devices = match state.store.get_devices() {
        Ok(d) => d,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let now = Utc::now();
    let grace = state.engine.classifier().grace();
    let statuses: Vec<DeviceStatus> = devices
        .into_iter()
        .map(|device| DeviceStatus {
            is_online: now - device.last_seen <= grace,
            device,
        })
        .collect();

    Json(statuses).into_response()
}

// ============================================================================
// API: Heartbeats
// ============================================================================

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: usize,
    pub dropped: usize,
}

pub async fn handle_ingest_heartbeats(
    State(state): State<AppState>,
    Json(raws): Json<Vec<RawHeartbeat>>,
) -> impl IntoResponse {
    let (records, dropped) = parse_heartbeats(raws);

    match state.scheduler.submit(records).await {
        Ok(accepted) => Json(IngestResponse { accepted, dropped }).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Uptime views
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UptimeQuery {
    #[serde(default)]
    pub mode: WindowMode,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub interval: Option<i64>,
}

pub async fn handle_get_uptime(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<UptimeQuery>,
) -> Result<Json<TimelineReport>, ReportError> {
    let request = WindowRequest {
        mode: query.mode,
        start_date: query.start_date,
        end_date: query.end_date,
        interval_minutes: query.interval.unwrap_or(state.config.interval_minutes),
    };

    timeline_report(state.store.as_ref(), &state.engine, &device_id, &request, Utc::now()).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    #[serde(default)]
    pub interval: Option<i64>,
}

pub async fn handle_get_week(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<WeekReport>, ReportError> {
    let interval = query.interval.unwrap_or(CALENDAR_INTERVAL_MINUTES);
    week_report(state.store.as_ref(), &state.engine, &device_id, Utc::now(), interval).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub interval: Option<i64>,
}

pub async fn handle_get_month(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthReport>, ReportError> {
    let now = Utc::now();
    let today = state.engine.calendar().today(now);
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());
    let interval = query.interval.unwrap_or(CALENDAR_INTERVAL_MINUTES);

    month_report(state.store.as_ref(), &state.engine, &device_id, year, month, now, interval).map(Json)
}

// ============================================================================
// API: Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub timezone: &'static str,
    pub grace_minutes: i64,
    pub db_size: String,
    #[serde(flatten)]
    pub stats: crate::db::StoreStats,
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_stats() {
        Ok(stats) => Json(StatusResponse {
            timezone: state.config.timezone.name(),
            grace_minutes: state.config.grace_minutes,
            db_size: format_bytes(stats.db_size_bytes),
            stats,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn format_bytes(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    const GB: i64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uptime::UptimeError;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_report_error_status() {
        let bad = ReportError::Window(UptimeError::InvalidWindow("end before start".to_string()));
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);

        let large = ReportError::Window(UptimeError::WindowTooLarge { buckets: 200_000, max: 100_000 });
        assert_eq!(large.into_response().status(), StatusCode::BAD_REQUEST);

        let store = ReportError::Store(crate::db::DbError::LockPoisoned);
        assert_eq!(store.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_uptime_query_defaults() {
        let query: UptimeQuery = serde_json::from_str(r#"{"start_date":"2024-01-15"}"#).unwrap();
        assert_eq!(query.mode, WindowMode::Rolling24h);
        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert!(query.interval.is_none());
    }
}
