//! Document lifecycle events as received from the host application.

use beacon_core::document::{Document, DocumentMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lifecycle event fired by the host application for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEvent {
    /// The document after the change.
    pub document: Document,

    /// Lifecycle hook that fired, e.g. `after_insert` or `on_update`.
    pub method: DocumentMethod,

    /// The document before the change, when the host supplies it.
    pub previous: Option<Document>,

    /// When the event was received (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DocumentEvent {
    pub fn new(document: Document, method: DocumentMethod) -> Self {
        Self {
            document,
            method,
            previous: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the pre-change snapshot used by value-change rules.
    pub fn with_previous(mut self, previous: Document) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Milliseconds since the event was received.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds()
    }
}
