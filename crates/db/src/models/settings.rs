//! Push provider settings.

use beacon_core::types::Timestamp;
use sqlx::FromRow;

/// The single row of the `push_settings` table.
///
/// Not `Serialize`: the credential blob must never reach an API response.
#[derive(Debug, Clone, FromRow)]
pub struct PushSettings {
    pub service_account_json: Option<String>,
    pub updated_at: Timestamp,
}
