//! Repository for the single-row `push_settings` table.

use sqlx::PgPool;

use crate::models::settings::PushSettings;

/// Provides access to the stored provider credential.
pub struct PushSettingsRepo;

impl PushSettingsRepo {
    pub async fn get(pool: &PgPool) -> Result<PushSettings, sqlx::Error> {
        sqlx::query_as::<_, PushSettings>(
            "SELECT service_account_json, updated_at FROM push_settings WHERE id = 1",
        )
        .fetch_one(pool)
        .await
    }

    /// The stored service-account JSON, if one has been configured.
    pub async fn service_account_json(pool: &PgPool) -> Result<Option<String>, sqlx::Error> {
        Ok(Self::get(pool).await?.service_account_json)
    }

    /// Replace the stored service-account JSON.
    pub async fn set_service_account_json(pool: &PgPool, json: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO push_settings (id, service_account_json, updated_at) \
             VALUES (1, $1, NOW()) \
             ON CONFLICT (id) DO UPDATE SET \
                service_account_json = EXCLUDED.service_account_json, \
                updated_at = NOW()",
        )
        .bind(json)
        .execute(pool)
        .await?;
        Ok(())
    }
}
