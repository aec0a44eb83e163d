//! Shared response envelope types for API handlers.
//!
//! Inspection endpoints answer with a `{ "data": ... }` envelope. Use
//! [`DataResponse`] instead of ad-hoc `serde_json::json!({ "data": ... })`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "status", "message", ... }` body returned by device registration.
///
/// Registration reports validation and storage problems in the body with
/// HTTP 200 so mobile clients can show the message as-is.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<beacon_core::types::DbId>,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>, device: beacon_core::types::DbId) -> Self {
        Self {
            status: "success",
            message: message.into(),
            device: Some(device),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            device: None,
        }
    }
}
