//! Document lifecycle trigger.
//!
//! [`TriggerHook`] is what the host calls for every document lifecycle
//! event. It runs fan-out inline, so the records exist before the event is
//! acknowledged, and hands the created record ids to the dispatch queue.
//! Failures are logged and reported as `None`; they never propagate into
//! the host's save.

use std::sync::Arc;

use crate::event::DocumentEvent;
use crate::fanout::{FanoutEngine, FanoutReport};
use crate::queue::DispatchQueue;

pub struct TriggerHook {
    engine: Arc<FanoutEngine>,
    queue: Option<DispatchQueue>,
}

impl TriggerHook {
    /// Create a hook. Without a queue, created records wait for the sweeper.
    pub fn new(engine: Arc<FanoutEngine>, queue: Option<DispatchQueue>) -> Self {
        Self { engine, queue }
    }

    /// Handle one document event. Returns `None` when fan-out failed and
    /// nothing was persisted.
    pub async fn on_document_event(&self, event: &DocumentEvent) -> Option<FanoutReport> {
        let report = match self.engine.process(event).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    doctype = event.document.doctype(),
                    name = event.document.name(),
                    method = %event.method,
                    received_at = %event.timestamp,
                    error = %e,
                    "Push fan-out failed"
                );
                return None;
            }
        };

        tracing::debug!(
            doctype = event.document.doctype(),
            name = event.document.name(),
            created = report.created.len(),
            skipped = report.skipped.len(),
            elapsed_ms = event.age_ms(),
            "Document event processed"
        );

        if let Some(queue) = &self.queue {
            for id in &report.created {
                queue.enqueue(*id);
            }
        }

        Some(report)
    }
}
