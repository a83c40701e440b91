//! Report assembly: fetch a device's heartbeats for a view, then run the engine.

use crate::db::{DbError, HeartbeatSource};
use crate::uptime::{
    month_window, validate_interval, week_window, BucketWindow, HeartbeatRecord, MonthReport, TimelineReport,
    UptimeEngine, UptimeError, WeekReport, WindowRequest,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Report error types.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Window(#[from] UptimeError),
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Heartbeats needed to classify `window`, including the grace look-back.
fn fetch_for_window<S>(
    source: &S,
    engine: &UptimeEngine,
    device_id: &str,
    window: &BucketWindow,
) -> Result<Vec<HeartbeatRecord>, DbError>
where
    S: HeartbeatSource + ?Sized,
{
    let from = window.start - engine.classifier().grace();
    let heartbeats = source.fetch_heartbeats(device_id, from, window.end)?;

    tracing::debug!(
        "Fetched {} heartbeats for {} ({} buckets of {}m)",
        heartbeats.len(),
        device_id,
        window.bucket_count(),
        window.interval_minutes
    );

    Ok(heartbeats)
}

pub fn timeline_report<S>(
    source: &S,
    engine: &UptimeEngine,
    device_id: &str,
    request: &WindowRequest,
    now: DateTime<Utc>,
) -> Result<TimelineReport, ReportError>
where
    S: HeartbeatSource + ?Sized,
{
    validate_interval(request.interval_minutes)?;

    let extent = if request.needs_extent() {
        source.heartbeat_extent(device_id)?
    } else {
        None
    };

    let window = engine.resolve_window(request, now, extent)?;
    let heartbeats = fetch_for_window(source, engine, device_id, &window)?;
    Ok(engine.timeline(heartbeats, &window))
}

pub fn week_report<S>(
    source: &S,
    engine: &UptimeEngine,
    device_id: &str,
    now: DateTime<Utc>,
    interval_minutes: i64,
) -> Result<WeekReport, ReportError>
where
    S: HeartbeatSource + ?Sized,
{
    validate_interval(interval_minutes)?;

    let window = week_window(engine.calendar(), now, interval_minutes)?;
    let heartbeats = fetch_for_window(source, engine, device_id, &window)?;
    Ok(engine.week(heartbeats, now, interval_minutes)?)
}

pub fn month_report<S>(
    source: &S,
    engine: &UptimeEngine,
    device_id: &str,
    year: i32,
    month: u32,
    now: DateTime<Utc>,
    interval_minutes: i64,
) -> Result<MonthReport, ReportError>
where
    S: HeartbeatSource + ?Sized,
{
    validate_interval(interval_minutes)?;

    let heartbeats = match month_window(engine.calendar(), year, month, now, interval_minutes)? {
        Some(window) => fetch_for_window(source, engine, device_id, &window)?,
        None => Vec::new(),
    };
    Ok(engine.month(heartbeats, year, month, now, interval_minutes)?)
}
