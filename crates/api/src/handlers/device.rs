//! Handlers for the `/devices` resource.

use axum::extract::State;
use axum::Json;
use beacon_core::device::DeviceRegistrationRequest;
use beacon_core::error::CoreError;
use beacon_db::models::device::UserDevice;
use beacon_db::repositories::DeviceRepo;

use crate::error::AppResult;
use crate::middleware::session::SessionUser;
use crate::response::{DataResponse, StatusResponse};
use crate::state::AppState;

const REGISTRATION_FAILED: &str =
    "An error occurred while registering the device. Please try again later.";

/// POST /api/v1/devices/register
///
/// Insert or update the caller's device keyed by `deviceId`. Validation and
/// storage failures are reported in the body, never as an HTTP error.
pub async fn register_device(
    user: SessionUser,
    State(state): State<AppState>,
    Json(input): Json<DeviceRegistrationRequest>,
) -> Json<StatusResponse> {
    let registration = match input.validate(&user.user_id) {
        Ok(registration) => registration,
        Err(CoreError::Validation(msg)) => return Json(StatusResponse::error(msg)),
        Err(e) => return Json(StatusResponse::error(e.to_string())),
    };

    let result = async {
        let mut tx = state.pool.begin().await?;
        let upserted = DeviceRepo::upsert(&mut *tx, &registration).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(upserted)
    }
    .await;

    match result {
        Ok(upserted) => {
            let message = if upserted.inserted {
                "Device registered successfully"
            } else {
                "Device updated successfully"
            };
            tracing::info!(
                user = %user.user_id,
                device_id = %upserted.device.device_id,
                platform = %upserted.device.platform,
                inserted = upserted.inserted,
                "Device registration stored"
            );
            Json(StatusResponse::success(message, upserted.device.id))
        }
        Err(e) => {
            tracing::error!(
                user = %user.user_id,
                device_id = %registration.device_id,
                error = %e,
                "Device registration failed"
            );
            Json(StatusResponse::error(REGISTRATION_FAILED))
        }
    }
}

/// GET /api/v1/devices
///
/// The acting user's registered devices, most recently updated first.
pub async fn list_devices(
    user: SessionUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<UserDevice>>>> {
    let devices = DeviceRepo::list_for_user(&state.pool, &user.user_id).await?;
    Ok(Json(DataResponse { data: devices }))
}
