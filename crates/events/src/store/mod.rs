//! Storage seams used by the pipeline.
//!
//! The fan-out engine, dispatcher and sweeper only see these traits.
//! [`PgStore`] implements them over PostgreSQL. With the `test-util`
//! feature, `MemoryStore` keeps everything in process memory.

#[cfg(any(test, feature = "test-util"))]
mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use beacon_core::delivery::{DeliveryIntent, DeliveryTarget, TokenResult};
use beacon_core::error::CoreError;
use beacon_core::rule::NotificationRule;
use beacon_core::types::{DbId, UserId};

#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryDelivery, MemoryStore};
pub use postgres::PgStore;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped into its domain type.
    #[error("Invalid stored data: {0}")]
    Invalid(#[from] CoreError),

    /// Raised by the in-memory store when writes are switched off.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A delivery record held under a dispatch lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedDelivery {
    pub id: DbId,
    /// Identifies this claim; renewals and results must present it.
    pub claim: i64,
    pub subject: String,
    pub body: String,
    pub target: DeliveryTarget,
    pub attempt_count: i32,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to notification rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Enabled push rules whose document type is `doctype`.
    async fn active_push_rules(&self, doctype: &str) -> Result<Vec<NotificationRule>, StoreError>;
}

/// Delivery records and their state transitions.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Insert one `NEW` record per intent, all or nothing.
    async fn create_deliveries(&self, intents: &[DeliveryIntent]) -> Result<Vec<DbId>, StoreError>;

    /// Lease a `NEW` record for dispatch; `None` if it is not claimable.
    async fn claim(&self, id: DbId, lease: Duration) -> Result<Option<ClaimedDelivery>, StoreError>;

    /// Push the lease of `claim` out to `lease` from now. `false` when the
    /// claim is no longer current.
    async fn renew_claim(&self, id: DbId, claim: i64, lease: Duration) -> Result<bool, StoreError>;

    /// Store the per-token results of one dispatch.
    async fn record_attempts(&self, id: DbId, results: &[TokenResult]) -> Result<(), StoreError>;

    /// `NEW -> SENT`, counting the attempt and releasing the lease. Applies
    /// only while `claim` is current.
    async fn mark_sent(
        &self,
        id: DbId,
        claim: i64,
        last_error: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Count an attempt that sent nothing; the record stays `NEW`. Applies
    /// only while `claim` is current.
    async fn record_failure(&self, id: DbId, claim: i64, error: &str) -> Result<bool, StoreError>;

    /// `NEW -> FAILED` for unleased records with `attempt_count >= max_attempts`.
    async fn mark_exhausted(&self, max_attempts: i32) -> Result<Vec<DbId>, StoreError>;

    /// Unleased `NEW` records with attempts left, untouched for `min_age`.
    async fn list_retryable(
        &self,
        max_attempts: i32,
        min_age: Duration,
        limit: i64,
    ) -> Result<Vec<DbId>, StoreError>;
}

/// Device token lookup.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Distinct tokens registered by `user`.
    async fn tokens_for_user(&self, user: &str) -> Result<Vec<String>, StoreError>;

    /// Distinct tokens of every registered device.
    async fn all_tokens(&self) -> Result<Vec<String>, StoreError>;
}

/// Team membership lookup.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    async fn members(&self, team: &str) -> Result<Vec<UserId>, StoreError>;
}

/// Stored provider settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn service_account_json(&self) -> Result<Option<String>, StoreError>;
}
