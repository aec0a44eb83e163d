//! Notification rule domain types, validation, and event matching.

use serde::{Deserialize, Serialize};

use crate::channels::NotificationChannel;
use crate::document::{Document, DocumentMethod};
use crate::error::CoreError;
use crate::types::DbId;

/// Maximum length of a rule name.
pub const MAX_RULE_NAME_LENGTH: usize = 140;

// ---------------------------------------------------------------------------
// NotificationEvent
// ---------------------------------------------------------------------------

/// Lifecycle event a rule listens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum NotificationEvent {
    New,
    Save,
    Submit,
    Cancel,
    /// Fires on save when the named field differs from the previous version.
    ValueChange(String),
}

impl NotificationEvent {
    /// Return the wire-format string stored in `notification_rules.event`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Save => "save",
            Self::Submit => "submit",
            Self::Cancel => "cancel",
            Self::ValueChange(_) => "value_change",
        }
    }

    /// Parse the stored `event` / `value_changed_field` column pair.
    pub fn from_columns(event: &str, field: Option<&str>) -> Result<Self, CoreError> {
        match event {
            "new" => Ok(Self::New),
            "save" => Ok(Self::Save),
            "submit" => Ok(Self::Submit),
            "cancel" => Ok(Self::Cancel),
            "value_change" => match field.map(str::trim).filter(|f| !f.is_empty()) {
                Some(field) => Ok(Self::ValueChange(field.to_string())),
                None => Err(CoreError::Validation(
                    "value_change rules require a value_changed_field".into(),
                )),
            },
            other => Err(CoreError::Validation(format!(
                "Unknown notification event: '{other}'"
            ))),
        }
    }

    /// Whether this event fired given the hook `method` and, for value
    /// changes, the `previous` snapshot of the document.
    pub fn matches(
        &self,
        method: &DocumentMethod,
        doc: &Document,
        previous: Option<&Document>,
    ) -> bool {
        match self {
            Self::New => *method == DocumentMethod::AfterInsert,
            Self::Save => *method == DocumentMethod::OnUpdate,
            Self::Submit => *method == DocumentMethod::OnSubmit,
            Self::Cancel => *method == DocumentMethod::OnCancel,
            Self::ValueChange(field) => {
                let is_save = matches!(method, DocumentMethod::OnUpdate | DocumentMethod::OnChange);
                match previous {
                    Some(previous) if is_save => previous.field(field) != doc.field(field),
                    _ => false,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

/// One row of a rule's recipient list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientEntry {
    /// Name of a document field holding a user identity (e.g. `owner`).
    pub document_field: Option<String>,
    /// A literal user identity.
    pub owner: Option<String>,
}

impl RecipientEntry {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            document_field: Some(name.into()),
            owner: None,
        }
    }

    pub fn owner(user: impl Into<String>) -> Self {
        Self {
            document_field: None,
            owner: Some(user.into()),
        }
    }
}

/// Recipient strategy implied by the shape of a rule's recipient list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSpec {
    /// Read each named field off the triggering document.
    Fields(Vec<String>),
    /// Address these users directly.
    Owners(Vec<String>),
    /// Every registered device.
    AllDevices,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// NotificationRule
// ---------------------------------------------------------------------------

/// An administrator-authored notification rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: DbId,
    pub name: String,
    pub enabled: bool,
    pub channel: NotificationChannel,
    pub document_type: Option<String>,
    /// `None` fires on every lifecycle event of the document type.
    pub event: Option<NotificationEvent>,
    pub condition: Option<String>,
    pub subject_template: Option<String>,
    pub message_template: String,
    pub recipients: Vec<RecipientEntry>,
}

impl NotificationRule {
    /// Check rule invariants before the rule is stored.
    pub fn validate(&self) -> Result<(), CoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Rule name must not be empty".into()));
        }
        if name.len() > MAX_RULE_NAME_LENGTH {
            return Err(CoreError::Validation(format!(
                "Rule name exceeds maximum length of {MAX_RULE_NAME_LENGTH} characters"
            )));
        }
        if self.channel == NotificationChannel::Push && self.document_type_name().is_none() {
            return Err(CoreError::Validation(
                "Document type is mandatory for push notification rules".into(),
            ));
        }
        if self.message_template.trim().is_empty() {
            return Err(CoreError::Validation("Message template must not be empty".into()));
        }
        Ok(())
    }

    fn document_type_name(&self) -> Option<&str> {
        self.document_type
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Whether this rule participates in push fan-out for `doctype`.
    pub fn is_active_push_rule_for(&self, doctype: &str) -> bool {
        self.enabled
            && self.channel == NotificationChannel::Push
            && self.document_type_name() == Some(doctype)
    }

    /// Whether the rule listens for this lifecycle event.
    pub fn matches_event(
        &self,
        method: &DocumentMethod,
        doc: &Document,
        previous: Option<&Document>,
    ) -> bool {
        match &self.event {
            None => true,
            Some(event) => event.matches(method, doc, previous),
        }
    }

    /// Derive the recipient strategy from the recipient list.
    pub fn recipient_spec(&self) -> RecipientSpec {
        let fields: Vec<String> = self
            .recipients
            .iter()
            .filter_map(|r| non_blank(&r.document_field))
            .collect();
        if !fields.is_empty() {
            return RecipientSpec::Fields(fields);
        }

        let owners: Vec<String> = self
            .recipients
            .iter()
            .filter_map(|r| non_blank(&r.owner))
            .collect();
        if !owners.is_empty() {
            return RecipientSpec::Owners(owners);
        }

        RecipientSpec::AllDevices
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
