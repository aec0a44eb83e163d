//! Bounded in-process dispatch queue.
//!
//! Delivery ids are pushed onto an mpsc channel and drained by a fixed pool
//! of worker tasks, each calling [`DeliveryDispatcher::dispatch`]. The queue
//! only carries ids; the delivery record in storage stays the source of
//! truth, so an id dropped on a full queue is picked up by the sweeper.

use std::sync::Arc;

use beacon_core::types::DbId;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{DeliveryDispatcher, DispatchOutcome};

/// Sending half of the dispatch queue.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: mpsc::Sender<DbId>,
}

impl DispatchQueue {
    /// Spawn `workers` dispatch tasks reading from a queue of `capacity`.
    ///
    /// Workers stop when `cancel` fires or when every sender is dropped.
    pub fn start(
        dispatcher: Arc<DeliveryDispatcher>,
        workers: usize,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (queue, receiver) = Self::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let dispatcher = Arc::clone(&dispatcher);
                let receiver = Arc::clone(&receiver);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    run_worker(worker, dispatcher, receiver, cancel).await;
                })
            })
            .collect();

        (queue, handles)
    }

    /// A queue without workers; the caller drains the returned receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DbId>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue `id` for dispatch. Returns `false` if the queue is full or
    /// closed.
    pub fn enqueue(&self, id: DbId) -> bool {
        match self.sender.try_send(id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(delivery_id = id, "Dispatch queue full, leaving delivery for the sweeper");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(delivery_id = id, "Dispatch queue closed");
                false
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    dispatcher: Arc<DeliveryDispatcher>,
    receiver: Arc<Mutex<mpsc::Receiver<DbId>>>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker, "Dispatch worker started");
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            id = async { receiver.lock().await.recv().await } => id,
        };
        let Some(id) = next else {
            break;
        };

        match dispatcher.dispatch(id).await {
            Ok(DispatchOutcome::NotClaimable) => {}
            Ok(outcome) => {
                tracing::debug!(worker, delivery_id = id, ?outcome, "Dispatch finished");
            }
            Err(e) => {
                tracing::error!(worker, delivery_id = id, error = %e, "Dispatch failed");
            }
        }
    }
    tracing::debug!(worker, "Dispatch worker stopped");
}
