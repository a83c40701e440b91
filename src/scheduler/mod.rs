//! Scheduler module for background heartbeat ingestion and retention.

mod retention;

pub use retention::*;

use crate::db::Store;
use crate::uptime::HeartbeatRecord;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Flush once this many heartbeats are buffered.
const FLUSH_THRESHOLD: usize = 500;

/// Flush buffered heartbeats at least this often.
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("heartbeat writer is not running")]
    WriterClosed,
}

/// Owns the background tasks that write and prune heartbeats.
pub struct Scheduler {
    heartbeat_tx: mpsc::Sender<HeartbeatRecord>,
    retention_manager: Arc<RetentionManager>,
}

impl Scheduler {
    /// Create a new scheduler and spawn its batch writer.
    pub fn new(store: Arc<Store>, retention_days: i64) -> Self {
        let (tx, rx) = mpsc::channel(10_000);

        let retention_manager = Arc::new(RetentionManager::new(store.clone(), retention_days));

        // Start batch writer in a separate task
        tokio::spawn(run_batch_writer(rx, store));

        Self {
            heartbeat_tx: tx,
            retention_manager,
        }
    }

    /// Start periodic background work.
    pub fn start(&self) {
        tracing::info!("Starting scheduler");
        self.retention_manager.start();
    }

    /// Queue heartbeats for writing, returning how many were queued.
    pub async fn submit(&self, heartbeats: Vec<HeartbeatRecord>) -> Result<usize, SchedulerError> {
        let count = heartbeats.len();
        for heartbeat in heartbeats {
            self.heartbeat_tx
                .send(heartbeat)
                .await
                .map_err(|_| SchedulerError::WriterClosed)?;
        }
        Ok(count)
    }

    /// Stop periodic background work.
    pub async fn stop(&self) {
        self.retention_manager.stop().await;
    }
}

/// Run the batch writer that accumulates and flushes heartbeats.
pub(crate) async fn run_batch_writer(mut rx: mpsc::Receiver<HeartbeatRecord>, store: Arc<Store>) {
    let mut buffer: Vec<HeartbeatRecord> = Vec::with_capacity(FLUSH_THRESHOLD);
    let mut interval = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some(h) => {
                        buffer.push(h);
                        if buffer.len() >= FLUSH_THRESHOLD {
                            flush_buffer(&store, &mut buffer);
                        }
                    }
                    None => {
                        // Channel closed, flush remaining and exit
                        flush_buffer(&store, &mut buffer);
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                flush_buffer(&store, &mut buffer);
            }
        }
    }
}

fn flush_buffer(store: &Store, buffer: &mut Vec<HeartbeatRecord>) {
    if buffer.is_empty() {
        return;
    }

    match store.add_heartbeats(buffer) {
        Ok(count) => tracing::debug!("Scheduler: Flushed {} heartbeats", count),
        Err(e) => tracing::error!("Failed to flush heartbeats: {}", e),
    }

    buffer.clear();
}
