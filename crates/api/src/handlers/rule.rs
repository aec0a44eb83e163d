//! Handlers for the `/rules` resource.
//!
//! Rules are written rarely by administrators and read on every document
//! event by the fan-out engine. Conditions and templates are parsed here so a
//! rule that could never evaluate is rejected up front.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use beacon_core::condition::Condition;
use beacon_core::error::CoreError;
use beacon_core::rule::NotificationRule;
use beacon_core::template::TemplateRenderer;
use beacon_core::types::DbId;
use beacon_db::models::rule::CreateNotificationRule;
use beacon_db::repositories::NotificationRuleRepo;
use beacon_db::DbPool;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::session::SessionUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /rules/{id}/enabled`.
#[derive(Debug, Deserialize)]
pub struct SetEnabled {
    pub enabled: bool,
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "NotificationRule",
        id,
    })
}

/// Reject conditions and templates that do not parse.
fn check_expressions(input: &CreateNotificationRule) -> Result<(), AppError> {
    if let Some(condition) = input.condition.as_deref().filter(|c| !c.trim().is_empty()) {
        Condition::parse(condition)
            .map_err(|e| AppError::BadRequest(format!("Invalid condition: {e}")))?;
    }
    let templates = TemplateRenderer::new();
    if let Some(subject) = input.subject_template.as_deref() {
        templates
            .check(subject)
            .map_err(|e| AppError::BadRequest(format!("Invalid subject template: {e}")))?;
    }
    templates
        .check(&input.message_template)
        .map_err(|e| AppError::BadRequest(format!("Invalid message template: {e}")))?;
    Ok(())
}

async fn load_rule(pool: &DbPool, id: DbId) -> AppResult<NotificationRule> {
    let row = NotificationRuleRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let recipients = NotificationRuleRepo::list_recipients(pool, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(row.into_rule(recipients)?)
}

/// POST /api/v1/rules
pub async fn create_rule(
    user: SessionUser,
    State(state): State<AppState>,
    Json(input): Json<CreateNotificationRule>,
) -> AppResult<(StatusCode, Json<DataResponse<NotificationRule>>)> {
    input.validate()?;
    check_expressions(&input)?;

    let row = NotificationRuleRepo::create(&state.pool, &input).await?;
    tracing::info!(
        rule_id = row.id,
        name = %row.name,
        user = %user.user_id,
        "Notification rule created"
    );

    let rule = load_rule(&state.pool, row.id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rule })))
}

/// GET /api/v1/rules/{id}
pub async fn get_rule(
    _user: SessionUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<NotificationRule>>> {
    let rule = load_rule(&state.pool, id).await?;
    Ok(Json(DataResponse { data: rule }))
}

/// PUT /api/v1/rules/{id}/enabled
pub async fn set_enabled(
    user: SessionUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SetEnabled>,
) -> AppResult<StatusCode> {
    if !NotificationRuleRepo::set_enabled(&state.pool, id, input.enabled).await? {
        return Err(not_found(id));
    }
    tracing::info!(
        rule_id = id,
        enabled = input.enabled,
        user = %user.user_id,
        "Notification rule toggled"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/rules/{id}
pub async fn delete_rule(
    user: SessionUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !NotificationRuleRepo::delete(&state.pool, id).await? {
        return Err(not_found(id));
    }
    tracing::info!(rule_id = id, user = %user.user_id, "Notification rule deleted");
    Ok(StatusCode::NO_CONTENT)
}
