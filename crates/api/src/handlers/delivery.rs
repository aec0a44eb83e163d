//! Handlers for the `/deliveries` resource (read-only inspection).

use axum::extract::{Path, Query, State};
use axum::Json;
use beacon_core::delivery::DeliveryStatus;
use beacon_core::error::CoreError;
use beacon_core::types::DbId;
use beacon_db::models::delivery::{DeliveryFilter, DeliveryWithAttempts, PushDelivery};
use beacon_db::repositories::{DeliveryAttemptRepo, PushDeliveryRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::session::SessionUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/deliveries?status=&target_user=&limit=&offset=
///
/// Newest first. `status` must be one of `NEW`, `SENT`, `FAILED`.
pub async fn list_deliveries(
    _user: SessionUser,
    State(state): State<AppState>,
    Query(mut filter): Query<DeliveryFilter>,
) -> AppResult<Json<DataResponse<Vec<PushDelivery>>>> {
    if let Some(status) = filter.status.as_deref() {
        let status = DeliveryStatus::from_str(&status.to_ascii_uppercase())?;
        filter.status = Some(status.as_str().to_string());
    }
    let deliveries = PushDeliveryRepo::list(&state.pool, &filter).await?;
    Ok(Json(DataResponse { data: deliveries }))
}

/// GET /api/v1/deliveries/{id}
///
/// One delivery record with its per-token attempts.
pub async fn get_delivery(
    _user: SessionUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DeliveryWithAttempts>>> {
    let delivery = PushDeliveryRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "PushDelivery",
            id,
        }))?;
    let attempts = DeliveryAttemptRepo::list_for_delivery(&state.pool, id).await?;

    Ok(Json(DataResponse {
        data: DeliveryWithAttempts { delivery, attempts },
    }))
}
