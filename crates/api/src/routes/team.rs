//! Route definitions for team membership.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::team;
use crate::state::AppState;

/// Routes mounted at `/teams`.
///
/// ```text
/// GET    /{team}/members            -> list_members
/// POST   /{team}/members            -> add_member
/// DELETE /{team}/members/{user_id}  -> remove_member
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{team}/members",
            get(team::list_members).post(team::add_member),
        )
        .route("/{team}/members/{user_id}", delete(team::remove_member))
}
