//! Delivery record status, targets, and per-token result aggregation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, UserId};

// ---------------------------------------------------------------------------
// DeliveryStatus
// ---------------------------------------------------------------------------

pub const STATUS_NEW: &str = "NEW";
pub const STATUS_SENT: &str = "SENT";
pub const STATUS_FAILED: &str = "FAILED";

/// Lifecycle status of a delivery record.
///
/// `New` is the only non-terminal state; records never return to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    New,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => STATUS_NEW,
            Self::Sent => STATUS_SENT,
            Self::Failed => STATUS_FAILED,
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            STATUS_NEW => Ok(Self::New),
            STATUS_SENT => Ok(Self::Sent),
            STATUS_FAILED => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown delivery status: '{other}'"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::New)
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Sent) | (Self::New, Self::Failed)
        )
    }
}

// ---------------------------------------------------------------------------
// Targets and intents
// ---------------------------------------------------------------------------

/// Who a delivery record is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "user", rename_all = "snake_case")]
pub enum DeliveryTarget {
    Broadcast,
    User(UserId),
}

impl DeliveryTarget {
    /// Map the `(broadcast, target_user)` column pair.
    pub fn from_columns(broadcast: bool, target_user: Option<&str>) -> Result<Self, CoreError> {
        match (broadcast, target_user) {
            (true, _) => Ok(Self::Broadcast),
            (false, Some(user)) if !user.trim().is_empty() => Ok(Self::User(user.to_string())),
            (false, _) => Err(CoreError::Internal(
                "Delivery record has neither a target user nor broadcast set".into(),
            )),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }

    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Broadcast => None,
            Self::User(user) => Some(user),
        }
    }
}

/// The document a delivery was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReference {
    pub doctype: String,
    pub name: String,
}

/// A delivery record to create, produced by fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryIntent {
    pub subject: String,
    pub body: String,
    pub target: DeliveryTarget,
    pub rule_id: Option<DbId>,
    pub reference: Option<DocumentReference>,
}

// ---------------------------------------------------------------------------
// Send results
// ---------------------------------------------------------------------------

/// Outcome of sending one record to one device token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResult {
    pub push_token: String,
    pub http_status: Option<u16>,
    pub error: Option<String>,
}

impl TokenResult {
    pub fn success(push_token: impl Into<String>, http_status: u16) -> Self {
        Self {
            push_token: push_token.into(),
            http_status: Some(http_status),
            error: None,
        }
    }

    pub fn failure(
        push_token: impl Into<String>,
        http_status: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            push_token: push_token.into(),
            http_status,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Tally of the per-token results of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Error text of the last failing token, kept on the record.
    pub last_error: Option<String>,
}

impl SendSummary {
    pub fn from_results(results: &[TokenResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match &result.error {
                None => summary.succeeded += 1,
                Some(error) => {
                    summary.failed += 1;
                    summary.last_error = Some(format!("{}: {error}", result.push_token));
                }
            }
        }
        summary
    }

    /// Status the record moves to: any success marks it sent, otherwise it
    /// stays `New` for a later retry.
    pub fn resulting_status(&self) -> DeliveryStatus {
        if self.succeeded > 0 {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::New
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_new_records_transition() {
        assert!(DeliveryStatus::New.can_transition_to(DeliveryStatus::Sent));
        assert!(DeliveryStatus::New.can_transition_to(DeliveryStatus::Failed));
        assert!(!DeliveryStatus::Sent.can_transition_to(DeliveryStatus::New));
        assert!(!DeliveryStatus::Failed.can_transition_to(DeliveryStatus::New));
        assert!(!DeliveryStatus::Sent.can_transition_to(DeliveryStatus::Failed));
        assert!(!DeliveryStatus::New.can_transition_to(DeliveryStatus::New));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [DeliveryStatus::New, DeliveryStatus::Sent, DeliveryStatus::Failed] {
            assert_eq!(DeliveryStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(DeliveryStatus::from_str("sent").is_err());
    }

    #[test]
    fn target_from_columns() {
        assert_eq!(DeliveryTarget::from_columns(true, None).unwrap(), DeliveryTarget::Broadcast);
        assert_eq!(
            DeliveryTarget::from_columns(false, Some("ana@example.com")).unwrap().user(),
            Some("ana@example.com")
        );
        assert!(DeliveryTarget::from_columns(false, None).is_err());
    }

    #[test]
    fn any_success_marks_sent() {
        let results = vec![
            TokenResult::failure("t1", Some(404), "HTTP 404"),
            TokenResult::success("t2", 200),
            TokenResult::failure("t3", None, "timed out"),
        ];
        let summary = SendSummary::from_results(&results);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.last_error.as_deref(), Some("t3: timed out"));
        assert_eq!(summary.resulting_status(), DeliveryStatus::Sent);
    }

    #[test]
    fn all_failures_keep_record_new() {
        let results = vec![TokenResult::failure("t1", Some(404), "HTTP 404")];
        let summary = SendSummary::from_results(&results);
        assert_eq!(summary.resulting_status(), DeliveryStatus::New);
        assert_eq!(SendSummary::from_results(&[]).resulting_status(), DeliveryStatus::New);
    }
}
