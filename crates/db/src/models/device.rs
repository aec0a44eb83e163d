//! Device registration models.

use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_devices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserDevice {
    pub id: DbId,
    pub user_id: String,
    pub device_id: String,
    pub push_token: String,
    pub platform: String,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Result of an upsert keyed by `device_id`.
#[derive(Debug, Clone, FromRow)]
pub struct UpsertedDevice {
    #[sqlx(flatten)]
    pub device: UserDevice,
    /// `true` when the row was inserted rather than updated.
    pub inserted: bool,
}
