//! fleetwatch - tablet fleet uptime service.
//!
//! The [`uptime`] module is the pure aggregation engine; the rest is the
//! service shell that stores heartbeats and serves reports over HTTP.

pub mod config;
pub mod db;
pub mod scheduler;
pub mod uptime;
pub mod web;
