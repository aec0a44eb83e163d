//! Route definitions for the `/devices` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::device;
use crate::state::AppState;

/// Routes mounted at `/devices`.
///
/// ```text
/// GET    /                          -> list_devices
/// POST   /register                  -> register_device
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(device::list_devices))
        .route("/register", post(device::register_device))
}
