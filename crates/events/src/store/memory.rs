//! In-memory store for embedding and tests.
//!
//! Mirrors the PostgreSQL semantics that matter to the pipeline: batch
//! inserts are all-or-nothing, status changes only leave `NEW`, a live lease
//! hides a record from other claimants and from the sweeper, and dispatch
//! results only apply under the current claim.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use beacon_core::delivery::{DeliveryIntent, DeliveryStatus, TokenResult};
use beacon_core::rule::NotificationRule;
use beacon_core::types::{DbId, UserId};

use super::{
    ClaimedDelivery, DeliveryStore, DeviceDirectory, RuleStore, SettingsStore, StoreError,
    TeamDirectory,
};

/// Snapshot of one in-memory delivery record.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDelivery {
    pub id: DbId,
    pub intent: DeliveryIntent,
    pub status: DeliveryStatus,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub attempts: Vec<TokenResult>,
    claimed_until: Option<Instant>,
    claim: i64,
    updated_at: Instant,
}

impl MemoryDelivery {
    fn is_leased(&self, now: Instant) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }

    fn held_by(&self, claim: i64) -> bool {
        self.status == DeliveryStatus::New && self.claim == claim
    }

    pub fn is_claimed(&self) -> bool {
        self.is_leased(Instant::now())
    }
}

#[derive(Default)]
struct Inner {
    next_id: DbId,
    rules: Vec<NotificationRule>,
    deliveries: BTreeMap<DbId, MemoryDelivery>,
    devices: Vec<(UserId, String)>,
    teams: HashMap<String, Vec<UserId>>,
    service_account_json: Option<String>,
    fail_writes: bool,
}

/// Thread-safe in-memory implementation of every store trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    pub fn add_rule(&self, rule: NotificationRule) {
        self.lock().rules.push(rule);
    }

    pub fn add_device(&self, user: impl Into<UserId>, token: impl Into<String>) {
        self.lock().devices.push((user.into(), token.into()));
    }

    pub fn add_team_member(&self, team: impl Into<String>, user: impl Into<UserId>) {
        self.lock()
            .teams
            .entry(team.into())
            .or_default()
            .push(user.into());
    }

    pub fn set_service_account_json(&self, json: impl Into<String>) {
        self.lock().service_account_json = Some(json.into());
    }

    /// Make every write fail with [`StoreError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn delivery(&self, id: DbId) -> Option<MemoryDelivery> {
        self.lock().deliveries.get(&id).cloned()
    }

    pub fn deliveries(&self) -> Vec<MemoryDelivery> {
        self.lock().deliveries.values().cloned().collect()
    }

    /// Rewind a record's last update so the sweeper sees it as old.
    pub fn age_delivery(&self, id: DbId, by: Duration) {
        if let Some(record) = self.lock().deliveries.get_mut(&id) {
            if let Some(earlier) = record.updated_at.checked_sub(by) {
                record.updated_at = earlier;
            }
        }
    }
}

fn check_writable(inner: &Inner) -> Result<(), StoreError> {
    if inner.fail_writes {
        return Err(StoreError::Unavailable("writes disabled".into()));
    }
    Ok(())
}

fn distinct(tokens: impl Iterator<Item = String>) -> Vec<String> {
    tokens
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn active_push_rules(&self, doctype: &str) -> Result<Vec<NotificationRule>, StoreError> {
        Ok(self
            .lock()
            .rules
            .iter()
            .filter(|r| r.is_active_push_rule_for(doctype))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn create_deliveries(&self, intents: &[DeliveryIntent]) -> Result<Vec<DbId>, StoreError> {
        let mut inner = self.lock();
        check_writable(&inner)?;

        let now = Instant::now();
        let mut ids = Vec::with_capacity(intents.len());
        for intent in intents {
            inner.next_id += 1;
            let id = inner.next_id;
            inner.deliveries.insert(
                id,
                MemoryDelivery {
                    id,
                    intent: intent.clone(),
                    status: DeliveryStatus::New,
                    attempt_count: 0,
                    last_error: None,
                    attempts: Vec::new(),
                    claimed_until: None,
                    claim: 0,
                    updated_at: now,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn claim(&self, id: DbId, lease: Duration) -> Result<Option<ClaimedDelivery>, StoreError> {
        let mut inner = self.lock();
        check_writable(&inner)?;

        let now = Instant::now();
        let Some(record) = inner.deliveries.get_mut(&id) else {
            return Ok(None);
        };
        if record.status != DeliveryStatus::New || record.is_leased(now) {
            return Ok(None);
        }
        record.claimed_until = Some(now + lease);
        record.claim += 1;
        record.updated_at = now;

        Ok(Some(ClaimedDelivery {
            id,
            claim: record.claim,
            subject: record.intent.subject.clone(),
            body: record.intent.body.clone(),
            target: record.intent.target.clone(),
            attempt_count: record.attempt_count,
        }))
    }

    async fn renew_claim(&self, id: DbId, claim: i64, lease: Duration) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        check_writable(&inner)?;
        match inner.deliveries.get_mut(&id) {
            Some(record) if record.held_by(claim) => {
                record.claimed_until = Some(Instant::now() + lease);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_attempts(&self, id: DbId, results: &[TokenResult]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        check_writable(&inner)?;
        if let Some(record) = inner.deliveries.get_mut(&id) {
            record.attempts.extend_from_slice(results);
        }
        Ok(())
    }

    async fn mark_sent(
        &self,
        id: DbId,
        claim: i64,
        last_error: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        check_writable(&inner)?;
        match inner.deliveries.get_mut(&id) {
            Some(record) if record.held_by(claim) => {
                record.status = DeliveryStatus::Sent;
                record.attempt_count += 1;
                record.claimed_until = None;
                record.last_error = last_error.map(str::to_string);
                record.updated_at = Instant::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_failure(&self, id: DbId, claim: i64, error: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        check_writable(&inner)?;
        match inner.deliveries.get_mut(&id) {
            Some(record) if record.held_by(claim) => {
                record.attempt_count += 1;
                record.claimed_until = None;
                record.last_error = Some(error.to_string());
                record.updated_at = Instant::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_exhausted(&self, max_attempts: i32) -> Result<Vec<DbId>, StoreError> {
        let mut inner = self.lock();
        check_writable(&inner)?;

        let now = Instant::now();
        let mut ids = Vec::new();
        for record in inner.deliveries.values_mut() {
            if record.status == DeliveryStatus::New
                && record.attempt_count >= max_attempts
                && !record.is_leased(now)
            {
                record.status = DeliveryStatus::Failed;
                record.claimed_until = None;
                record.updated_at = now;
                ids.push(record.id);
            }
        }
        Ok(ids)
    }

    async fn list_retryable(
        &self,
        max_attempts: i32,
        min_age: Duration,
        limit: i64,
    ) -> Result<Vec<DbId>, StoreError> {
        let inner = self.lock();
        let now = Instant::now();
        Ok(inner
            .deliveries
            .values()
            .filter(|r| {
                r.status == DeliveryStatus::New
                    && r.attempt_count < max_attempts
                    && !r.is_leased(now)
                    && now.duration_since(r.updated_at) >= min_age
            })
            .map(|r| r.id)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl DeviceDirectory for MemoryStore {
    async fn tokens_for_user(&self, user: &str) -> Result<Vec<String>, StoreError> {
        Ok(distinct(
            self.lock()
                .devices
                .iter()
                .filter(|(owner, _)| owner == user)
                .map(|(_, token)| token.clone()),
        ))
    }

    async fn all_tokens(&self) -> Result<Vec<String>, StoreError> {
        Ok(distinct(
            self.lock().devices.iter().map(|(_, token)| token.clone()),
        ))
    }
}

#[async_trait]
impl TeamDirectory for MemoryStore {
    async fn members(&self, team: &str) -> Result<Vec<UserId>, StoreError> {
        Ok(self.lock().teams.get(team).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn service_account_json(&self) -> Result<Option<String>, StoreError> {
        Ok(self.lock().service_account_json.clone())
    }
}
