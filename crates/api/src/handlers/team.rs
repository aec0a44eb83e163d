//! Handlers for the `/teams/{team}/members` resource.
//!
//! Team membership feeds the team-assignment recipient strategy.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use beacon_db::models::team::TeamMember;
use beacon_db::repositories::TeamRepo;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::session::SessionUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /teams/{team}/members`.
#[derive(Debug, Deserialize)]
pub struct AddMember {
    pub user_id: String,
}

/// GET /api/v1/teams/{team}/members
pub async fn list_members(
    _user: SessionUser,
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> AppResult<Json<DataResponse<Vec<TeamMember>>>> {
    let members = TeamRepo::list_members(&state.pool, &team).await?;
    Ok(Json(DataResponse { data: members }))
}

/// POST /api/v1/teams/{team}/members
///
/// Idempotent: adding an existing member is a no-op.
pub async fn add_member(
    user: SessionUser,
    State(state): State<AppState>,
    Path(team): Path<String>,
    Json(input): Json<AddMember>,
) -> AppResult<StatusCode> {
    let user_id = input.user_id.trim();
    if team.trim().is_empty() || user_id.is_empty() {
        return Err(AppError::BadRequest("team and user_id must not be empty".into()));
    }
    TeamRepo::add_member(&state.pool, &team, user_id).await?;
    tracing::info!(team = %team, member = %user_id, user = %user.user_id, "Team member added");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/teams/{team}/members/{user_id}
pub async fn remove_member(
    user: SessionUser,
    State(state): State<AppState>,
    Path((team, user_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    if !TeamRepo::remove_member(&state.pool, &team, &user_id).await? {
        return Err(AppError::Database(sqlx::Error::RowNotFound));
    }
    tracing::info!(team = %team, member = %user_id, user = %user.user_id, "Team member removed");
    Ok(StatusCode::NO_CONTENT)
}
