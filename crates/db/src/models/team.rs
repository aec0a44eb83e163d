//! Team membership models.

use beacon_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `team_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMember {
    pub team: String,
    pub user_id: String,
    pub created_at: Timestamp,
}
