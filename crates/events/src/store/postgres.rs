//! PostgreSQL-backed store over the `beacon-db` repositories.

use std::time::Duration;

use async_trait::async_trait;
use beacon_core::delivery::{DeliveryIntent, TokenResult};
use beacon_core::rule::NotificationRule;
use beacon_core::types::{DbId, UserId};
use beacon_db::models::delivery::{NewDeliveryAttempt, NewPushDelivery};
use beacon_db::repositories::{
    DeliveryAttemptRepo, DeviceRepo, NotificationRuleRepo, PushDeliveryRepo, PushSettingsRepo,
    TeamRepo,
};
use beacon_db::DbPool;

use super::{
    ClaimedDelivery, DeliveryStore, DeviceDirectory, RuleStore, SettingsStore, StoreError,
    TeamDirectory,
};

/// Store implementation backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Leases are stored with whole-second precision, never shorter than one.
fn lease_secs(lease: Duration) -> i64 {
    lease.as_secs().max(1) as i64
}

#[async_trait]
impl RuleStore for PgStore {
    async fn active_push_rules(&self, doctype: &str) -> Result<Vec<NotificationRule>, StoreError> {
        let rows = NotificationRuleRepo::list_active_push(&self.pool, doctype).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for (row, recipients) in rows {
            let id = row.id;
            match row.into_rule(recipients) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::warn!(rule_id = id, error = %e, "Skipping unreadable notification rule");
                }
            }
        }
        Ok(rules)
    }
}

#[async_trait]
impl DeliveryStore for PgStore {
    async fn create_deliveries(&self, intents: &[DeliveryIntent]) -> Result<Vec<DbId>, StoreError> {
        if intents.is_empty() {
            return Ok(Vec::new());
        }

        // Dropping `tx` on an early return rolls the whole batch back.
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(intents.len());
        for intent in intents {
            let record = PushDeliveryRepo::create(&mut *tx, &NewPushDelivery::from(intent)).await?;
            ids.push(record.id);
        }
        tx.commit().await?;
        Ok(ids)
    }

    async fn claim(&self, id: DbId, lease: Duration) -> Result<Option<ClaimedDelivery>, StoreError> {
        let Some(record) = PushDeliveryRepo::claim(&self.pool, id, lease_secs(lease)).await?
        else {
            return Ok(None);
        };
        let target = record.target()?;
        Ok(Some(ClaimedDelivery {
            id: record.id,
            claim: record.claim_token,
            subject: record.subject,
            body: record.body,
            target,
            attempt_count: record.attempt_count,
        }))
    }

    async fn renew_claim(&self, id: DbId, claim: i64, lease: Duration) -> Result<bool, StoreError> {
        Ok(PushDeliveryRepo::renew_claim(&self.pool, id, claim, lease_secs(lease)).await?)
    }

    async fn record_attempts(&self, id: DbId, results: &[TokenResult]) -> Result<(), StoreError> {
        let attempts: Vec<NewDeliveryAttempt> = results.iter().map(NewDeliveryAttempt::from).collect();
        DeliveryAttemptRepo::create_many(&self.pool, id, &attempts).await?;
        Ok(())
    }

    async fn mark_sent(
        &self,
        id: DbId,
        claim: i64,
        last_error: Option<&str>,
    ) -> Result<bool, StoreError> {
        Ok(PushDeliveryRepo::mark_sent(&self.pool, id, claim, last_error).await?)
    }

    async fn record_failure(&self, id: DbId, claim: i64, error: &str) -> Result<bool, StoreError> {
        Ok(PushDeliveryRepo::record_failed_attempt(&self.pool, id, claim, error).await?)
    }

    async fn mark_exhausted(&self, max_attempts: i32) -> Result<Vec<DbId>, StoreError> {
        Ok(PushDeliveryRepo::mark_exhausted(&self.pool, max_attempts).await?)
    }

    async fn list_retryable(
        &self,
        max_attempts: i32,
        min_age: Duration,
        limit: i64,
    ) -> Result<Vec<DbId>, StoreError> {
        Ok(PushDeliveryRepo::list_retryable(
            &self.pool,
            max_attempts,
            min_age.as_secs() as i64,
            limit,
        )
        .await?)
    }
}

#[async_trait]
impl DeviceDirectory for PgStore {
    async fn tokens_for_user(&self, user: &str) -> Result<Vec<String>, StoreError> {
        Ok(DeviceRepo::tokens_for_user(&self.pool, user).await?)
    }

    async fn all_tokens(&self) -> Result<Vec<String>, StoreError> {
        Ok(DeviceRepo::all_tokens(&self.pool).await?)
    }
}

#[async_trait]
impl TeamDirectory for PgStore {
    async fn members(&self, team: &str) -> Result<Vec<UserId>, StoreError> {
        Ok(TeamRepo::member_ids(&self.pool, team).await?)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn service_account_json(&self) -> Result<Option<String>, StoreError> {
        Ok(PushSettingsRepo::service_account_json(&self.pool).await?)
    }
}
