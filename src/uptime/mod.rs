//! Uptime interval aggregation and pattern analysis.
//!
//! Turns an irregular list of device heartbeats into a fixed-width
//! online/offline bucket series and derives statistics, behavioural patterns
//! and calendar rollups from it. Everything here is pure and synchronous:
//! callers fetch heartbeats, the engine only computes.

mod bucket;
mod calendar;
mod classify;
mod engine;
mod index;
mod models;
mod patterns;
mod rollup;
mod stats;

pub use bucket::*;
pub use calendar::*;
pub use classify::*;
pub use engine::*;
pub use index::*;
pub use models::*;
pub use patterns::*;
pub use rollup::*;
pub use stats::*;

use thiserror::Error;

/// Engine error types.
///
/// Only the two window variants ever escape a public entry point;
/// `MalformedHeartbeat` is recovered by dropping the offending record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UptimeError {
    #[error("invalid window: {0}")]
    InvalidWindow(String),
    #[error("window too large: {buckets} buckets exceeds the limit of {max}")]
    WindowTooLarge { buckets: i64, max: i64 },
    #[error("malformed heartbeat: {0}")]
    MalformedHeartbeat(String),
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
