//! Push delivery record and attempt models.

use beacon_core::delivery::{DeliveryIntent, DeliveryStatus, DeliveryTarget, TokenResult};
use beacon_core::error::CoreError;
use beacon_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `push_deliveries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushDelivery {
    pub id: DbId,
    pub subject: String,
    pub body: String,
    pub target_user: Option<String>,
    pub broadcast: bool,
    pub status: String,
    pub rule_id: Option<DbId>,
    pub reference_document_type: Option<String>,
    pub reference_document_name: Option<String>,
    pub attempt_count: i32,
    pub claimed_until: Option<Timestamp>,
    /// Bumped by every claim; terminal updates must present the current value.
    pub claim_token: i64,
    pub sent_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PushDelivery {
    pub fn status(&self) -> Result<DeliveryStatus, CoreError> {
        DeliveryStatus::from_str(&self.status)
    }

    pub fn target(&self) -> Result<DeliveryTarget, CoreError> {
        DeliveryTarget::from_columns(self.broadcast, self.target_user.as_deref())
    }
}

/// A row from the `push_delivery_attempts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushDeliveryAttempt {
    pub id: DbId,
    pub delivery_id: DbId,
    pub push_token: String,
    pub success: bool,
    pub http_status: Option<i32>,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

/// A delivery record together with its per-token attempts.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryWithAttempts {
    #[serde(flatten)]
    pub delivery: PushDelivery,
    pub attempts: Vec<PushDeliveryAttempt>,
}

// ---------------------------------------------------------------------------
// Create DTOs
// ---------------------------------------------------------------------------

/// Input for inserting a delivery record in status `NEW`.
#[derive(Debug, Clone)]
pub struct NewPushDelivery {
    pub subject: String,
    pub body: String,
    pub target_user: Option<String>,
    pub broadcast: bool,
    pub rule_id: Option<DbId>,
    pub reference_document_type: Option<String>,
    pub reference_document_name: Option<String>,
}

impl From<&DeliveryIntent> for NewPushDelivery {
    fn from(intent: &DeliveryIntent) -> Self {
        Self {
            subject: intent.subject.clone(),
            body: intent.body.clone(),
            target_user: intent.target.user().map(str::to_string),
            broadcast: intent.target.is_broadcast(),
            rule_id: intent.rule_id,
            reference_document_type: intent.reference.as_ref().map(|r| r.doctype.clone()),
            reference_document_name: intent.reference.as_ref().map(|r| r.name.clone()),
        }
    }
}

/// Input for recording one per-token send.
#[derive(Debug, Clone)]
pub struct NewDeliveryAttempt {
    pub push_token: String,
    pub success: bool,
    pub http_status: Option<i32>,
    pub error: Option<String>,
}

impl From<&TokenResult> for NewDeliveryAttempt {
    fn from(result: &TokenResult) -> Self {
        Self {
            push_token: result.push_token.clone(),
            success: result.is_success(),
            http_status: result.http_status.map(i32::from),
            error: result.error.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Query filter
// ---------------------------------------------------------------------------

/// Query parameters for listing deliveries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryFilter {
    pub status: Option<String>,
    pub target_user: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
