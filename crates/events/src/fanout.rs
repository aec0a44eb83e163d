//! Fan-out of document events into delivery records.
//!
//! For each active push rule of the document's type the engine checks the
//! lifecycle event, evaluates the condition, renders subject and body, and
//! resolves recipients. Every resulting intent is written in one batch. A
//! failing rule is skipped and logged without affecting the others; a
//! failing batch write fails the whole event. No network I/O happens here.

use std::sync::Arc;

use beacon_core::condition::{self, ConditionError};
use beacon_core::delivery::{DeliveryIntent, DeliveryTarget, DocumentReference};
use beacon_core::document::Document;
use beacon_core::recipient::RecipientSet;
use beacon_core::rule::NotificationRule;
use beacon_core::template::{RenderError, TemplateRenderer};
use beacon_core::types::DbId;
use serde::Serialize;

use crate::event::DocumentEvent;
use crate::recipients::RecipientResolver;
use crate::store::{DeliveryStore, RuleStore, StoreError};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why a rule produced no delivery records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    EventMismatch,
    ConditionFalse,
    #[serde(serialize_with = "as_display")]
    Condition(ConditionError),
    #[serde(serialize_with = "as_display")]
    Render(RenderError),
    NoRecipients,
}

fn as_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRule {
    pub rule_id: DbId,
    pub rule_name: String,
    pub reason: SkipReason,
}

/// Outcome of processing one document event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FanoutReport {
    /// Ids of the delivery records created, in intent order.
    pub created: Vec<DbId>,
    pub skipped: Vec<SkippedRule>,
}

/// Error type for fan-out failures that abort the whole event.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("Failed to load notification rules: {0}")]
    Rules(#[source] StoreError),

    #[error("Failed to persist delivery records: {0}")]
    Persistence(#[source] StoreError),
}

// ---------------------------------------------------------------------------
// FanoutEngine
// ---------------------------------------------------------------------------

pub struct FanoutEngine {
    rules: Arc<dyn RuleStore>,
    deliveries: Arc<dyn DeliveryStore>,
    resolver: RecipientResolver,
    templates: TemplateRenderer,
}

impl FanoutEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        deliveries: Arc<dyn DeliveryStore>,
        resolver: RecipientResolver,
    ) -> Self {
        Self {
            rules,
            deliveries,
            resolver,
            templates: TemplateRenderer::new(),
        }
    }

    /// Turn one document event into persisted `NEW` delivery records.
    pub async fn process(&self, event: &DocumentEvent) -> Result<FanoutReport, FanoutError> {
        let doc = &event.document;
        let rules = self
            .rules
            .active_push_rules(doc.doctype())
            .await
            .map_err(FanoutError::Rules)?;

        let mut report = FanoutReport::default();
        let mut intents = Vec::new();

        for rule in &rules {
            match self.plan_rule(rule, event).await {
                Ok(planned) => intents.extend(planned),
                Err(reason) => {
                    log_skip(rule, doc, &reason);
                    report.skipped.push(SkippedRule {
                        rule_id: rule.id,
                        rule_name: rule.name.clone(),
                        reason,
                    });
                }
            }
        }

        if !intents.is_empty() {
            report.created = self
                .deliveries
                .create_deliveries(&intents)
                .await
                .map_err(FanoutError::Persistence)?;

            tracing::info!(
                doctype = doc.doctype(),
                name = doc.name(),
                method = %event.method,
                records = report.created.len(),
                "Created push delivery records"
            );
        }

        Ok(report)
    }

    /// Intents produced by a single rule, or why it was skipped.
    async fn plan_rule(
        &self,
        rule: &NotificationRule,
        event: &DocumentEvent,
    ) -> Result<Vec<DeliveryIntent>, SkipReason> {
        let doc = &event.document;
        if !rule.matches_event(&event.method, doc, event.previous.as_ref()) {
            return Err(SkipReason::EventMismatch);
        }

        match condition::evaluate(rule.condition.as_deref(), doc) {
            Ok(true) => {}
            Ok(false) => return Err(SkipReason::ConditionFalse),
            Err(e) => return Err(SkipReason::Condition(e)),
        }

        let subject = self.render_subject(rule, doc).map_err(SkipReason::Render)?;
        let body = self
            .templates
            .render(&rule.message_template, doc)
            .map_err(SkipReason::Render)?;

        let reference = Some(DocumentReference {
            doctype: doc.doctype().to_string(),
            name: doc.name().to_string(),
        });
        let intent = |target| DeliveryIntent {
            subject: subject.clone(),
            body: body.clone(),
            target,
            rule_id: Some(rule.id),
            reference: reference.clone(),
        };

        match self.resolver.resolve(rule, doc).await {
            RecipientSet::Broadcast => Ok(vec![intent(DeliveryTarget::Broadcast)]),
            RecipientSet::Users(users) if users.is_empty() => Err(SkipReason::NoRecipients),
            RecipientSet::Users(users) => Ok(users
                .into_iter()
                .map(|user| intent(DeliveryTarget::User(user)))
                .collect()),
        }
    }

    /// Render the subject template, falling back to `"{rule}: {document}"`.
    fn render_subject(
        &self,
        rule: &NotificationRule,
        doc: &Document,
    ) -> Result<String, RenderError> {
        match rule
            .subject_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            Some(source) => self.templates.render(source, doc),
            None => Ok(format!("{}: {}", rule.name, doc.name())),
        }
    }
}

fn log_skip(rule: &NotificationRule, doc: &Document, reason: &SkipReason) {
    match reason {
        SkipReason::Condition(e) => tracing::warn!(
            rule_id = rule.id,
            doctype = doc.doctype(),
            name = doc.name(),
            error = %e,
            "Skipping rule: condition could not be evaluated"
        ),
        SkipReason::Render(e) => tracing::warn!(
            rule_id = rule.id,
            doctype = doc.doctype(),
            name = doc.name(),
            error = %e,
            "Skipping rule: template could not be rendered"
        ),
        SkipReason::NoRecipients => tracing::debug!(
            rule_id = rule.id,
            name = doc.name(),
            "Skipping rule: no recipients resolved"
        ),
        SkipReason::ConditionFalse | SkipReason::EventMismatch => tracing::trace!(
            rule_id = rule.id,
            name = doc.name(),
            reason = ?reason,
            "Rule does not apply"
        ),
    }
}
