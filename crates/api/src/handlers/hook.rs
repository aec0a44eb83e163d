//! Handler for the document-event hook.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use beacon_core::document::{Document, DocumentMethod};
use beacon_events::{DocumentEvent, SkipReason};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Body of `POST /hooks/document-event`.
#[derive(Debug, Deserialize)]
pub struct DocumentEventRequest {
    pub doctype: String,
    pub name: String,
    /// Lifecycle hook that fired, e.g. `on_update`.
    pub method: DocumentMethod,
    /// Field values after the change.
    #[serde(default)]
    pub doc: Value,
    /// Field values before the change, for value-change rules.
    pub previous: Option<Value>,
}

/// Body of a `202` hook response.
#[derive(Debug, Serialize)]
pub struct HookAccepted {
    pub status: &'static str,
    /// Delivery records created for the event.
    pub created: usize,
    /// Rules that matched the document type but produced nothing.
    pub skipped: usize,
}

/// POST /api/v1/hooks/document-event
///
/// Run fan-out for the event and return 202 once its delivery records are
/// committed. Per-rule problems are only logged; if the records could not be
/// stored the caller gets 503 and may resend the event.
pub async fn document_event(
    State(state): State<AppState>,
    Json(input): Json<DocumentEventRequest>,
) -> AppResult<(StatusCode, Json<HookAccepted>)> {
    let doctype = input.doctype.trim();
    let name = input.name.trim();
    if doctype.is_empty() || name.is_empty() {
        return Err(AppError::BadRequest(
            "doctype and name must not be empty".into(),
        ));
    }
    if !matches!(input.doc, Value::Object(_) | Value::Null) {
        return Err(AppError::BadRequest("doc must be a JSON object".into()));
    }

    let mut event = DocumentEvent::new(
        Document::from_value(doctype, name, input.doc),
        input.method,
    );
    if let Some(previous) = input.previous {
        event = event.with_previous(Document::from_value(doctype, name, previous));
    }

    let Some(report) = state.trigger.on_document_event(&event).await else {
        return Err(AppError::Unavailable(
            "Notifications for this event could not be stored".into(),
        ));
    };
    let no_recipients = report
        .skipped
        .iter()
        .filter(|s| s.reason == SkipReason::NoRecipients)
        .count();
    tracing::debug!(
        doctype,
        name,
        created = report.created.len(),
        no_recipients,
        "Document event accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(HookAccepted {
            status: "accepted",
            created: report.created.len(),
            skipped: report.skipped.len(),
        }),
    ))
}
