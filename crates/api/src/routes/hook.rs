//! Route definitions for host application hooks.

use axum::routing::post;
use axum::Router;

use crate::handlers::hook;
use crate::state::AppState;

/// Routes mounted at `/hooks`.
///
/// ```text
/// POST   /document-event            -> document_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/document-event", post(hook::document_event))
}
