//! Recipient resolution.
//!
//! [`RecipientResolver`] turns a rule and its triggering document into a
//! [`RecipientSet`]. A [`RecipientStrategy`] registered for the document
//! type gets the first say; when it has no opinion (or fails), resolution
//! falls back to the rule's own recipient list.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::document::Document;
use beacon_core::recipient::{resolve_spec, users_in_field, RecipientSet};
use beacon_core::rule::NotificationRule;
use beacon_core::types::UserId;

use crate::store::{StoreError, TeamDirectory};

/// Document field read by [`TeamAssignmentStrategy`] by default.
pub const DEFAULT_TEAM_FIELD: &str = "assigned_team";

// ---------------------------------------------------------------------------
// RecipientStrategy
// ---------------------------------------------------------------------------

/// Document-type specific recipient logic.
#[async_trait]
pub trait RecipientStrategy: Send + Sync {
    /// Users to notify, or an empty list to defer to the rule's recipients.
    async fn resolve(
        &self,
        rule: &NotificationRule,
        doc: &Document,
    ) -> Result<Vec<UserId>, StoreError>;
}

/// Expands the team named in a document field into the team's members.
pub struct TeamAssignmentStrategy {
    teams: Arc<dyn TeamDirectory>,
    field: String,
}

impl TeamAssignmentStrategy {
    pub fn new(teams: Arc<dyn TeamDirectory>) -> Self {
        Self::with_field(teams, DEFAULT_TEAM_FIELD)
    }

    pub fn with_field(teams: Arc<dyn TeamDirectory>, field: impl Into<String>) -> Self {
        Self {
            teams,
            field: field.into(),
        }
    }
}

#[async_trait]
impl RecipientStrategy for TeamAssignmentStrategy {
    async fn resolve(
        &self,
        _rule: &NotificationRule,
        doc: &Document,
    ) -> Result<Vec<UserId>, StoreError> {
        let mut users = BTreeSet::new();
        for team in users_in_field(doc, &self.field) {
            users.extend(self.teams.members(&team).await?);
        }
        Ok(users.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// RecipientResolver
// ---------------------------------------------------------------------------

/// Resolves rules to recipient sets. Never fails.
#[derive(Default, Clone)]
pub struct RecipientResolver {
    strategies: HashMap<String, Arc<dyn RecipientStrategy>>,
}

impl RecipientResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `strategy` for documents of type `doctype`.
    pub fn with_strategy(
        mut self,
        doctype: impl Into<String>,
        strategy: Arc<dyn RecipientStrategy>,
    ) -> Self {
        self.strategies.insert(doctype.into(), strategy);
        self
    }

    pub async fn resolve(&self, rule: &NotificationRule, doc: &Document) -> RecipientSet {
        if let Some(strategy) = self.strategies.get(doc.doctype()) {
            match strategy.resolve(rule, doc).await {
                Ok(users) if !users.is_empty() => return RecipientSet::users(users),
                Ok(_) => {
                    tracing::debug!(
                        rule_id = rule.id,
                        doctype = doc.doctype(),
                        "Recipient strategy found nobody, using rule recipients"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        rule_id = rule.id,
                        doctype = doc.doctype(),
                        error = %e,
                        "Recipient strategy failed, using rule recipients"
                    );
                }
            }
        }

        resolve_spec(&rule.recipient_spec(), doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::channels::NotificationChannel;
    use beacon_core::rule::RecipientEntry;
    use serde_json::json;

    use crate::store::MemoryStore;

    fn rule(recipients: Vec<RecipientEntry>) -> NotificationRule {
        NotificationRule {
            id: 1,
            name: "Assigned".into(),
            enabled: true,
            channel: NotificationChannel::Push,
            document_type: Some("Task".into()),
            event: None,
            condition: None,
            subject_template: None,
            message_template: "m".into(),
            recipients,
        }
    }

    fn resolver(store: Arc<MemoryStore>) -> RecipientResolver {
        RecipientResolver::new().with_strategy("Task", Arc::new(TeamAssignmentStrategy::new(store)))
    }

    #[tokio::test]
    async fn team_strategy_expands_members() {
        let store = Arc::new(MemoryStore::new());
        store.add_team_member("Maintenance", "ana@example.com");
        store.add_team_member("Maintenance", "ben@example.com");

        let doc = Document::from_value("Task", "T1", json!({"assigned_team": "Maintenance"}));
        let set = resolver(store).resolve(&rule(vec![]), &doc).await;
        assert_eq!(set, RecipientSet::users(["ana@example.com", "ben@example.com"]));
    }

    #[tokio::test]
    async fn empty_team_falls_back_to_rule_recipients() {
        let store = Arc::new(MemoryStore::new());
        let doc = Document::from_value(
            "Task",
            "T1",
            json!({"assigned_team": "Nobody", "owner": "cara@example.com"}),
        );

        let set = resolver(store.clone())
            .resolve(&rule(vec![RecipientEntry::field("owner")]), &doc)
            .await;
        assert_eq!(set, RecipientSet::users(["cara@example.com"]));

        let set = resolver(store).resolve(&rule(vec![]), &doc).await;
        assert_eq!(set, RecipientSet::Broadcast);
    }

    #[tokio::test]
    async fn strategies_only_apply_to_their_doctype() {
        let store = Arc::new(MemoryStore::new());
        store.add_team_member("Maintenance", "ana@example.com");
        let doc = Document::from_value("Issue", "I1", json!({"assigned_team": "Maintenance"}));

        let set = resolver(store)
            .resolve(&rule(vec![RecipientEntry::owner("dan@example.com")]), &doc)
            .await;
        assert_eq!(set, RecipientSet::users(["dan@example.com"]));
    }
}
