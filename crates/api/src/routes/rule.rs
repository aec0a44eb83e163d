//! Route definitions for the `/rules` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::rule;
use crate::state::AppState;

/// Routes mounted at `/rules`.
///
/// ```text
/// POST   /                          -> create_rule
/// GET    /{id}                      -> get_rule
/// DELETE /{id}                      -> delete_rule
/// PUT    /{id}/enabled              -> set_enabled
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(rule::create_rule))
        .route("/{id}", get(rule::get_rule).delete(rule::delete_rule))
        .route("/{id}/enabled", put(rule::set_enabled))
}
