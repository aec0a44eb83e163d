//! Repository for the `user_devices` table.

use beacon_core::device::NewDeviceRegistration;
use sqlx::{PgConnection, PgPool};

use crate::models::device::{UpsertedDevice, UserDevice};

/// Column list for `user_devices` queries.
const COLUMNS: &str = "id, user_id, device_id, push_token, platform, device_name, \
    device_model, os_version, created_at, updated_at";

/// Provides device registration storage and token lookup.
pub struct DeviceRepo;

impl DeviceRepo {
    /// Insert a device or update the existing row with the same `device_id`.
    ///
    /// `inserted` on the result distinguishes the two cases.
    pub async fn upsert(
        conn: &mut PgConnection,
        input: &NewDeviceRegistration,
    ) -> Result<UpsertedDevice, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_devices \
                (user_id, device_id, push_token, platform, device_name, device_model, os_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (device_id) DO UPDATE SET \
                user_id      = EXCLUDED.user_id, \
                push_token   = EXCLUDED.push_token, \
                platform     = EXCLUDED.platform, \
                device_name  = EXCLUDED.device_name, \
                device_model = EXCLUDED.device_model, \
                os_version   = EXCLUDED.os_version, \
                updated_at   = NOW() \
             RETURNING {COLUMNS}, (xmax = 0) AS inserted"
        );
        sqlx::query_as::<_, UpsertedDevice>(&query)
            .bind(&input.user)
            .bind(&input.device_id)
            .bind(&input.push_token)
            .bind(input.platform.as_str())
            .bind(&input.device_name)
            .bind(&input.device_model)
            .bind(&input.os_version)
            .fetch_one(conn)
            .await
    }

    /// List a user's devices, most recently updated first.
    pub async fn list_for_user(pool: &PgPool, user: &str) -> Result<Vec<UserDevice>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_devices WHERE user_id = $1 ORDER BY updated_at DESC"
        );
        sqlx::query_as::<_, UserDevice>(&query)
            .bind(user)
            .fetch_all(pool)
            .await
    }

    /// Distinct non-empty push tokens registered by `user`.
    pub async fn tokens_for_user(pool: &PgPool, user: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT push_token FROM user_devices \
             WHERE user_id = $1 AND push_token <> '' \
             ORDER BY push_token",
        )
        .bind(user)
        .fetch_all(pool)
        .await
    }

    /// Distinct non-empty push tokens across every registered device.
    pub async fn all_tokens(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT push_token FROM user_devices \
             WHERE push_token <> '' \
             ORDER BY push_token",
        )
        .fetch_all(pool)
        .await
    }
}
