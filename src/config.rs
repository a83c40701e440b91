//! Configuration module for fleetwatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::uptime::{validate_interval, TimeZoneCalendar, DEFAULT_GRACE_MINUTES, DEFAULT_INTERVAL_MINUTES};

use chrono_tz::Tz;
use std::env;

/// Timezone used when none (or an unknown one) is configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "fleetwatch.db")
    pub db_path: String,
    /// Timezone for all local-day and local-hour grouping
    pub timezone: Tz,
    /// Minutes after a heartbeat during which a device still counts as online
    pub grace_minutes: i64,
    /// Days of heartbeats to keep; 0 keeps everything
    pub retention_days: i64,
    /// Default bucket width for timeline views
    pub interval_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "fleetwatch.db".to_string(),
            timezone: DEFAULT_TIMEZONE,
            grace_minutes: DEFAULT_GRACE_MINUTES,
            retention_days: 90,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FLEETWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `FLEETWATCH_DB_PATH`: Database file path (default: "fleetwatch.db")
    /// - `FLEETWATCH_TIMEZONE`: IANA timezone name (default: "America/Los_Angeles")
    /// - `FLEETWATCH_GRACE_MINUTES`: Online grace window (default: 3)
    /// - `FLEETWATCH_RETENTION_DAYS`: Heartbeat retention (default: 90)
    /// - `FLEETWATCH_INTERVAL_MINUTES`: Timeline bucket width (default: 5)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("FLEETWATCH_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("FLEETWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(name) = lookup("FLEETWATCH_TIMEZONE") {
            cfg.timezone = parse_timezone(&name);
        }

        if let Some(grace) = lookup("FLEETWATCH_GRACE_MINUTES").and_then(|s| s.parse::<i64>().ok()) {
            if grace >= 0 {
                cfg.grace_minutes = grace;
            }
        }

        if let Some(days) = lookup("FLEETWATCH_RETENTION_DAYS").and_then(|s| s.parse::<i64>().ok()) {
            cfg.retention_days = days.max(0);
        }

        if let Some(interval) = lookup("FLEETWATCH_INTERVAL_MINUTES").and_then(|s| s.parse::<i64>().ok()) {
            match validate_interval(interval) {
                Ok(interval) => cfg.interval_minutes = interval,
                Err(e) => tracing::warn!("Ignoring FLEETWATCH_INTERVAL_MINUTES: {}", e),
            }
        }

        cfg
    }

    pub fn calendar(&self) -> TimeZoneCalendar {
        TimeZoneCalendar::new(self.timezone)
    }
}

/// Parse an IANA timezone name, falling back to [`DEFAULT_TIMEZONE`].
fn parse_timezone(name: &str) -> Tz {
    match TimeZoneCalendar::from_name(name) {
        Some(calendar) => calendar.timezone(),
        None => {
            tracing::warn!("Unknown timezone {:?}, using {}", name, DEFAULT_TIMEZONE.name());
            DEFAULT_TIMEZONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "fleetwatch.db");
        assert_eq!(cfg.timezone, chrono_tz::America::Los_Angeles);
        assert_eq!(cfg.grace_minutes, 3);
        assert_eq!(cfg.interval_minutes, 5);
    }

    #[test]
    fn test_overrides() {
        let cfg = load_from(&[
            ("FLEETWATCH_HTTP_PORT", "9090"),
            ("FLEETWATCH_TIMEZONE", "Europe/Berlin"),
            ("FLEETWATCH_GRACE_MINUTES", "5"),
            ("FLEETWATCH_RETENTION_DAYS", "0"),
            ("FLEETWATCH_INTERVAL_MINUTES", "15"),
        ]);
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(cfg.grace_minutes, 5);
        assert_eq!(cfg.retention_days, 0);
        assert_eq!(cfg.interval_minutes, 15);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let cfg = load_from(&[
            ("FLEETWATCH_HTTP_PORT", "not-a-port"),
            ("FLEETWATCH_TIMEZONE", "Mars/Olympus_Mons"),
            ("FLEETWATCH_GRACE_MINUTES", "-2"),
            ("FLEETWATCH_INTERVAL_MINUTES", "7"),
        ]);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.timezone, DEFAULT_TIMEZONE);
        assert_eq!(cfg.grace_minutes, 3);
        assert_eq!(cfg.interval_minutes, 5);
    }
}
