//! Route definitions for the `/deliveries` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::delivery;
use crate::state::AppState;

/// Routes mounted at `/deliveries`.
///
/// ```text
/// GET    /                          -> list_deliveries
/// GET    /{id}                      -> get_delivery
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(delivery::list_deliveries))
        .route("/{id}", get(delivery::get_delivery))
}
