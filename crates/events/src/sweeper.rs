//! Retry sweeper for undelivered records.
//!
//! [`PendingSweeper`] runs as a background task. Each pass first marks
//! `NEW` records that used up their attempts as `FAILED`, then re-enqueues
//! unleased `NEW` records that have sat idle for at least `min_age`.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::types::DbId;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::queue::DispatchQueue;
use crate::store::{DeliveryStore, StoreError};

/// How often the sweeper runs by default.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Idle time before a `NEW` record is retried.
pub const DEFAULT_RETRY_MIN_AGE: Duration = Duration::from_secs(60);

/// Maximum records re-enqueued per pass.
pub const DEFAULT_SWEEP_BATCH: i64 = 200;

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records moved to `FAILED`.
    pub exhausted: Vec<DbId>,
    /// Records handed back to the dispatch queue.
    pub requeued: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// PendingSweeper
// ---------------------------------------------------------------------------

pub struct PendingSweeper {
    deliveries: Arc<dyn DeliveryStore>,
    queue: DispatchQueue,
    interval: Duration,
    max_attempts: i32,
    min_age: Duration,
    batch: i64,
}

impl PendingSweeper {
    pub fn new(deliveries: Arc<dyn DeliveryStore>, queue: DispatchQueue, max_attempts: i32) -> Self {
        Self {
            deliveries,
            queue,
            interval: DEFAULT_SWEEP_INTERVAL,
            max_attempts,
            min_age: DEFAULT_RETRY_MIN_AGE,
            batch: DEFAULT_SWEEP_BATCH,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_min_age(mut self, min_age: Duration) -> Self {
        self.min_age = min_age;
        self
    }

    pub fn with_batch(mut self, batch: i64) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// Run the sweep loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Pending sweeper cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Failed to sweep pending deliveries");
                    }
                }
            }
        }
    }

    /// Run a single sweep pass.
    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let exhausted = self.deliveries.mark_exhausted(self.max_attempts).await?;
        if !exhausted.is_empty() {
            tracing::warn!(
                count = exhausted.len(),
                max_attempts = self.max_attempts,
                "Marked deliveries as failed after exhausting attempts"
            );
        }

        let retryable = self
            .deliveries
            .list_retryable(self.max_attempts, self.min_age, self.batch)
            .await?;

        let mut requeued = Vec::with_capacity(retryable.len());
        for id in retryable {
            if !self.queue.enqueue(id) {
                break;
            }
            requeued.push(id);
        }

        if !requeued.is_empty() {
            tracing::info!(count = requeued.len(), "Re-enqueued pending deliveries");
        }

        Ok(SweepReport {
            exhausted,
            requeued,
        })
    }
}
