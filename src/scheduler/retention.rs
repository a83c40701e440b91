//! Retention manager for pruning old heartbeats.

use crate::db::{DbError, Store};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Longest retention accepted, in days.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Manager for deleting heartbeats past the retention period.
pub struct RetentionManager {
    store: Arc<Store>,
    retention_days: i64,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl RetentionManager {
    /// A `retention_days` of zero or less keeps heartbeats forever.
    pub fn new(store: Arc<Store>, retention_days: i64) -> Self {
        Self {
            store,
            retention_days: retention_days.min(MAX_RETENTION_DAYS),
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the retention manager background task.
    pub fn start(&self) {
        if self.retention_days <= 0 {
            tracing::info!("RetentionManager: retention disabled, keeping all heartbeats");
            return;
        }

        let store = self.store.clone();
        let stop = self.stop.clone();
        let retention_days = self.retention_days;

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(Duration::from_secs(60));

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = process_retention(&store, retention_days, Utc::now()) {
                            tracing::error!("RetentionManager: Failed to delete heartbeats: {}", e);
                        }
                    }
                }
            }
        });
    }

    /// Stop the retention manager.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// Delete heartbeats older than `retention_days` before `now`.
pub fn process_retention(store: &Store, retention_days: i64, now: DateTime<Utc>) -> Result<usize, DbError> {
    let cutoff = now - ChronoDuration::days(retention_days.clamp(0, MAX_RETENTION_DAYS));
    let deleted = store.delete_heartbeats_before(cutoff)?;

    if deleted > 0 {
        tracing::info!(
            "RetentionManager: Deleted {} heartbeats older than {}",
            deleted,
            cutoff.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(deleted)
}
