//! Repository for the `notification_rules` and `notification_rule_recipients`
//! tables.

use std::collections::HashMap;

use beacon_core::channels::CHANNEL_PUSH;
use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::rule::{CreateNotificationRule, NotificationRuleRow, RuleRecipientRow};

/// Column list for `notification_rules` queries.
const COLUMNS: &str = "id, name, enabled, channel, document_type, event, value_changed_field, \
    condition, subject_template, message_template, created_at, updated_at";

/// Column list for `notification_rule_recipients` queries.
const RECIPIENT_COLUMNS: &str = "id, rule_id, document_field, owner, sort_order";

/// Provides CRUD operations for notification rules.
pub struct NotificationRuleRepo;

impl NotificationRuleRepo {
    /// Insert a rule and its recipient rows in one transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreateNotificationRule,
    ) -> Result<NotificationRuleRow, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let (event, value_changed_field) = input.event_columns();

        let query = format!(
            "INSERT INTO notification_rules \
                (name, enabled, channel, document_type, event, value_changed_field, \
                 condition, subject_template, message_template) \
             VALUES ($1, COALESCE($2, true), $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        let rule = sqlx::query_as::<_, NotificationRuleRow>(&query)
            .bind(&input.name)
            .bind(input.enabled)
            .bind(input.channel.as_str())
            .bind(&input.document_type)
            .bind(event)
            .bind(value_changed_field)
            .bind(&input.condition)
            .bind(&input.subject_template)
            .bind(&input.message_template)
            .fetch_one(&mut *tx)
            .await?;

        for (i, recipient) in input.recipients.iter().enumerate() {
            sqlx::query(
                "INSERT INTO notification_rule_recipients \
                    (rule_id, document_field, owner, sort_order) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(rule.id)
            .bind(&recipient.document_field)
            .bind(&recipient.owner)
            .bind(i as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rule)
    }

    /// Find a rule by its primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NotificationRuleRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notification_rules WHERE id = $1");
        sqlx::query_as::<_, NotificationRuleRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List enabled push rules for a document type, each with its recipients.
    pub async fn list_active_push(
        pool: &PgPool,
        document_type: &str,
    ) -> Result<Vec<(NotificationRuleRow, Vec<RuleRecipientRow>)>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_rules \
             WHERE enabled = true AND channel = $1 AND document_type = $2 \
             ORDER BY id ASC"
        );
        let rules = sqlx::query_as::<_, NotificationRuleRow>(&query)
            .bind(CHANNEL_PUSH)
            .bind(document_type)
            .fetch_all(pool)
            .await?;

        let ids: Vec<DbId> = rules.iter().map(|r| r.id).collect();
        let mut recipients = Self::list_recipients(pool, &ids).await?;

        Ok(rules
            .into_iter()
            .map(|rule| {
                let rows = recipients.remove(&rule.id).unwrap_or_default();
                (rule, rows)
            })
            .collect())
    }

    /// Recipient rows for the given rules, grouped by rule id.
    pub async fn list_recipients(
        pool: &PgPool,
        rule_ids: &[DbId],
    ) -> Result<HashMap<DbId, Vec<RuleRecipientRow>>, sqlx::Error> {
        if rule_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM notification_rule_recipients \
             WHERE rule_id = ANY($1) \
             ORDER BY rule_id ASC, sort_order ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, RuleRecipientRow>(&query)
            .bind(rule_ids)
            .fetch_all(pool)
            .await?;

        let mut grouped: HashMap<DbId, Vec<RuleRecipientRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.rule_id).or_default().push(row);
        }
        Ok(grouped)
    }

    /// Enable or disable a rule. Returns `true` if the rule exists.
    pub async fn set_enabled(pool: &PgPool, id: DbId, enabled: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_rules SET enabled = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(enabled)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a rule and, by cascade, its recipients.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notification_rules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
