//! Notification rule models and DTOs.

use beacon_core::channels::NotificationChannel;
use beacon_core::error::CoreError;
use beacon_core::rule::{NotificationEvent, NotificationRule, RecipientEntry};
use beacon_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `notification_rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationRuleRow {
    pub id: DbId,
    pub name: String,
    pub enabled: bool,
    pub channel: String,
    pub document_type: Option<String>,
    pub event: Option<String>,
    pub value_changed_field: Option<String>,
    pub condition: Option<String>,
    pub subject_template: Option<String>,
    pub message_template: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `notification_rule_recipients` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RuleRecipientRow {
    pub id: DbId,
    pub rule_id: DbId,
    pub document_field: Option<String>,
    pub owner: Option<String>,
    pub sort_order: i32,
}

impl NotificationRuleRow {
    /// Convert into the domain rule, attaching its recipient rows.
    pub fn into_rule(self, recipients: Vec<RuleRecipientRow>) -> Result<NotificationRule, CoreError> {
        let channel = NotificationChannel::from_str(&self.channel)?;
        let event = self
            .event
            .as_deref()
            .map(|e| NotificationEvent::from_columns(e, self.value_changed_field.as_deref()))
            .transpose()?;

        Ok(NotificationRule {
            id: self.id,
            name: self.name,
            enabled: self.enabled,
            channel,
            document_type: self.document_type,
            event,
            condition: self.condition,
            subject_template: self.subject_template,
            message_template: self.message_template,
            recipients: recipients
                .into_iter()
                .map(|r| RecipientEntry {
                    document_field: r.document_field,
                    owner: r.owner,
                })
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a rule together with its recipient list.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotificationRule {
    pub name: String,
    pub enabled: Option<bool>,
    pub channel: NotificationChannel,
    pub document_type: Option<String>,
    pub event: Option<NotificationEvent>,
    pub condition: Option<String>,
    pub subject_template: Option<String>,
    pub message_template: String,
    #[serde(default)]
    pub recipients: Vec<RecipientEntry>,
}

impl CreateNotificationRule {
    /// Check the rule invariants before insert.
    pub fn validate(&self) -> Result<(), CoreError> {
        NotificationRule {
            id: 0,
            name: self.name.clone(),
            enabled: self.enabled.unwrap_or(true),
            channel: self.channel,
            document_type: self.document_type.clone(),
            event: self.event.clone(),
            condition: self.condition.clone(),
            subject_template: self.subject_template.clone(),
            message_template: self.message_template.clone(),
            recipients: self.recipients.clone(),
        }
        .validate()
    }

    pub(crate) fn event_columns(&self) -> (Option<&'static str>, Option<&str>) {
        match &self.event {
            None => (None, None),
            Some(event @ NotificationEvent::ValueChange(field)) => (Some(event.as_str()), Some(field.as_str())),
            Some(event) => (Some(event.as_str()), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(event: Option<&str>, field: Option<&str>) -> NotificationRuleRow {
        NotificationRuleRow {
            id: 9,
            name: "Approved".into(),
            enabled: true,
            channel: "push".into(),
            document_type: Some("Task".into()),
            event: event.map(String::from),
            value_changed_field: field.map(String::from),
            condition: None,
            subject_template: None,
            message_template: "{{ doc.name }}".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_into_domain_rule() {
        let recipients = vec![RuleRecipientRow {
            id: 1,
            rule_id: 9,
            document_field: Some("owner".into()),
            owner: None,
            sort_order: 0,
        }];
        let rule = row(Some("value_change"), Some("status"))
            .into_rule(recipients)
            .unwrap();
        assert_eq!(rule.channel, NotificationChannel::Push);
        assert_eq!(rule.event, Some(NotificationEvent::ValueChange("status".into())));
        assert_eq!(rule.recipients, vec![RecipientEntry::field("owner")]);
    }

    #[test]
    fn unknown_channel_fails_conversion() {
        let mut bad = row(None, None);
        bad.channel = "pager".into();
        assert!(bad.into_rule(vec![]).is_err());
    }
}
