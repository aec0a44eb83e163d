//! Acting-user extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use beacon_core::error::CoreError;
use beacon_core::types::UserId;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the identity of the user the host application
/// authenticated.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The acting user, read from the `X-User-Id` header.
///
/// Authentication happens in the host application (or a gateway in front of
/// it); this service trusts the forwarded identity.
///
/// ```ignore
/// async fn my_handler(user: SessionUser) -> AppResult<Json<()>> {
///     tracing::info!(user = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-User-Id header".into()))
            })?;

        Ok(SessionUser {
            user_id: user_id.to_string(),
        })
    }
}
