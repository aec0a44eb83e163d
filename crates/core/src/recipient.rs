//! Recipient sets and the rule-shape resolution strategies.
//!
//! Per-document-type strategies (team expansion and friends) need storage and
//! live in `beacon-events`; this module covers the pure part: reading user
//! identities off a document or a rule's owner list.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::document::Document;
use crate::rule::RecipientSpec;
use crate::types::UserId;

/// Concrete audience of one rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "users", rename_all = "snake_case")]
pub enum RecipientSet {
    /// Every registered device, expanded at dispatch time.
    Broadcast,
    /// Distinct user identities. May be empty.
    Users(BTreeSet<UserId>),
}

impl RecipientSet {
    pub fn users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        Self::Users(users.into_iter().map(Into::into).collect())
    }

    /// `true` for a user set with nobody in it.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Users(users) if users.is_empty())
    }
}

/// Resolve a rule-shape recipient spec against `doc`.
pub fn resolve_spec(spec: &RecipientSpec, doc: &Document) -> RecipientSet {
    match spec {
        RecipientSpec::Fields(names) => {
            let mut users = BTreeSet::new();
            for name in names {
                users.extend(users_in_field(doc, name));
            }
            RecipientSet::Users(users)
        }
        RecipientSpec::Owners(owners) => RecipientSet::users(
            owners
                .iter()
                .map(|o| o.trim())
                .filter(|o| !o.is_empty()),
        ),
        RecipientSpec::AllDevices => RecipientSet::Broadcast,
    }
}

/// User identities held by a document field: a non-empty string, or the
/// non-empty strings of an array.
pub fn users_in_field(doc: &Document, field: &str) -> Vec<UserId> {
    match doc.field(field) {
        Some(Value::String(s)) => non_empty(s).into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(non_empty)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_empty(s: &str) -> Option<UserId> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
