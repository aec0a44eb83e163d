pub mod delivery;
pub mod device;
pub mod health;
pub mod hook;
pub mod rule;
pub mod team;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /devices                               the acting user's devices
/// /devices/register                      register or update a device (POST)
///
/// /hooks/document-event                  document lifecycle event (POST, 202)
///
/// /deliveries                            list delivery records
/// /deliveries/{id}                       one record with its attempts
///
/// /rules                                 create (POST)
/// /rules/{id}                            get, delete
/// /rules/{id}/enabled                    enable / disable (PUT)
///
/// /teams/{team}/members                  list, add
/// /teams/{team}/members/{user_id}        remove
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/devices", device::router())
        .nest("/hooks", hook::router())
        .nest("/deliveries", delivery::router())
        .nest("/rules", rule::router())
        .nest("/teams", team::router())
}
