//! Dispatch of one delivery record to the push provider.
//!
//! [`DeliveryDispatcher::dispatch`] claims the record, resolves device
//! tokens, acquires a provider token and sends to every device with bounded
//! concurrency. Each token's outcome is recorded. Any success marks the
//! record `SENT`; a dispatch with no success leaves it `NEW` for the
//! [`PendingSweeper`](crate::sweeper::PendingSweeper).
//!
//! The lease is renewed while the dispatch runs, so a slow provider does not
//! let a second dispatcher claim the same record. Results are written under
//! the claim that produced them; if the lease was lost anyway, the outcome is
//! discarded and the record is left to its current owner.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::delivery::{DeliveryStatus, DeliveryTarget, SendSummary, TokenResult};
use beacon_core::types::DbId;
use futures::stream::{self, StreamExt};

use crate::delivery::credential::{AccessToken, CredentialError, TokenSource};
use crate::delivery::fcm::PushTransport;
use crate::store::{ClaimedDelivery, DeliveryStore, DeviceDirectory, StoreError};

/// How long a claimed record is hidden from other dispatchers. Renewed every
/// third of the lease while the dispatch is running.
pub const DISPATCH_LEASE: Duration = Duration::from_secs(120);

/// Maximum provider requests in flight for one record.
pub const MAX_CONCURRENT_SENDS: usize = 8;

/// Recorded when the target has no registered device.
pub const NO_DEVICES_ERROR: &str = "No registered devices";

// ---------------------------------------------------------------------------
// Outcome / Error
// ---------------------------------------------------------------------------

/// What a dispatch did with its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The record was terminal, missing, or leased by someone else.
    NotClaimable,
    /// The target had no device tokens; an attempt was counted.
    NoDevices,
    /// At least one device accepted the notification.
    Sent { succeeded: usize, failed: usize },
    /// Every device send failed; the record stays `NEW`.
    AllFailed { failed: usize },
    /// Another dispatcher took the record over before the result was stored.
    LeaseLost,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Delivery store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider credentials unavailable: {0}")]
    Credential(#[from] CredentialError),
}

// ---------------------------------------------------------------------------
// DeliveryDispatcher
// ---------------------------------------------------------------------------

pub struct DeliveryDispatcher {
    deliveries: Arc<dyn DeliveryStore>,
    devices: Arc<dyn DeviceDirectory>,
    tokens: Arc<dyn TokenSource>,
    transport: Arc<dyn PushTransport>,
    lease: Duration,
    max_concurrent_sends: usize,
}

impl DeliveryDispatcher {
    pub fn new(
        deliveries: Arc<dyn DeliveryStore>,
        devices: Arc<dyn DeviceDirectory>,
        tokens: Arc<dyn TokenSource>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            deliveries,
            devices,
            tokens,
            transport,
            lease: DISPATCH_LEASE,
            max_concurrent_sends: MAX_CONCURRENT_SENDS,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_max_concurrent_sends(mut self, n: usize) -> Self {
        self.max_concurrent_sends = n.max(1);
        self
    }

    /// Dispatch the delivery record `id`.
    pub async fn dispatch(&self, id: DbId) -> Result<DispatchOutcome, DispatchError> {
        let Some(claimed) = self.deliveries.claim(id, self.lease).await? else {
            tracing::debug!(delivery_id = id, "Delivery not claimable, skipping");
            return Ok(DispatchOutcome::NotClaimable);
        };
        self.hold_lease(&claimed, self.deliver(&claimed)).await
    }

    /// Drive `work` to completion, renewing the lease of `claimed` meanwhile.
    async fn hold_lease<F: Future>(&self, claimed: &ClaimedDelivery, work: F) -> F::Output {
        let period = (self.lease / 3).max(Duration::from_millis(10));
        let mut renew = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut held = true;
        tokio::pin!(work);

        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = renew.tick(), if held => {
                    let renewed = self
                        .deliveries
                        .renew_claim(claimed.id, claimed.claim, self.lease)
                        .await;
                    match renewed {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::warn!(
                                delivery_id = claimed.id,
                                "Delivery lease lost during dispatch"
                            );
                            held = false;
                        }
                        Err(e) => {
                            tracing::warn!(
                                delivery_id = claimed.id,
                                error = %e,
                                "Failed to renew delivery lease"
                            );
                        }
                    }
                }
            }
        }
    }

    async fn deliver(&self, claimed: &ClaimedDelivery) -> Result<DispatchOutcome, DispatchError> {
        let id = claimed.id;

        let device_tokens = match self.device_tokens(&claimed.target).await {
            Ok(tokens) => tokens,
            Err(e) => {
                self.record_failure(claimed, &e.to_string()).await?;
                return Err(e.into());
            }
        };

        if device_tokens.is_empty() {
            tracing::info!(
                delivery_id = id,
                delivery_target = ?claimed.target,
                "No registered devices for delivery"
            );
            if !self.record_failure(claimed, NO_DEVICES_ERROR).await? {
                return Ok(DispatchOutcome::LeaseLost);
            }
            return Ok(DispatchOutcome::NoDevices);
        }

        let access = match self.tokens.access_token().await {
            Ok(access) => access,
            Err(e) => {
                tracing::error!(delivery_id = id, error = %e, "Failed to acquire provider token");
                self.record_failure(claimed, &e.to_string()).await?;
                return Err(e.into());
            }
        };

        let results = self.send_all(claimed, &access, device_tokens).await;
        self.deliveries.record_attempts(id, &results).await?;

        let summary = SendSummary::from_results(&results);
        match summary.resulting_status() {
            DeliveryStatus::Sent => {
                let stored = self
                    .deliveries
                    .mark_sent(id, claimed.claim, summary.last_error.as_deref())
                    .await?;
                if !stored {
                    tracing::warn!(delivery_id = id, "Delivery lease lost, sent status not stored");
                    return Ok(DispatchOutcome::LeaseLost);
                }
                tracing::info!(
                    delivery_id = id,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Push delivery sent"
                );
                Ok(DispatchOutcome::Sent {
                    succeeded: summary.succeeded,
                    failed: summary.failed,
                })
            }
            _ => {
                let error = summary
                    .last_error
                    .unwrap_or_else(|| "All device sends failed".to_string());
                if !self.record_failure(claimed, &error).await? {
                    return Ok(DispatchOutcome::LeaseLost);
                }
                tracing::warn!(
                    delivery_id = id,
                    attempt = claimed.attempt_count + 1,
                    failed = summary.failed,
                    "Push delivery failed for every device"
                );
                Ok(DispatchOutcome::AllFailed {
                    failed: summary.failed,
                })
            }
        }
    }

    /// Count a failed attempt under the current claim. `false` when the claim
    /// was superseded and nothing was written.
    async fn record_failure(
        &self,
        claimed: &ClaimedDelivery,
        error: &str,
    ) -> Result<bool, StoreError> {
        let stored = self
            .deliveries
            .record_failure(claimed.id, claimed.claim, error)
            .await?;
        if !stored {
            tracing::warn!(
                delivery_id = claimed.id,
                "Delivery lease lost, failed attempt not stored"
            );
        }
        Ok(stored)
    }

    async fn device_tokens(&self, target: &DeliveryTarget) -> Result<Vec<String>, StoreError> {
        match target {
            DeliveryTarget::Broadcast => self.devices.all_tokens().await,
            DeliveryTarget::User(user) => self.devices.tokens_for_user(user).await,
        }
    }

    async fn send_all(
        &self,
        claimed: &ClaimedDelivery,
        access: &AccessToken,
        device_tokens: Vec<String>,
    ) -> Vec<TokenResult> {
        stream::iter(device_tokens)
            .map(|device_token| async move {
                match self
                    .transport
                    .send(access, &device_token, &claimed.subject, &claimed.body)
                    .await
                {
                    Ok(status) => TokenResult::success(device_token, status),
                    Err(e) => {
                        tracing::error!(
                            delivery_id = claimed.id,
                            push_token = %device_token,
                            error = %e,
                            "Push send failed"
                        );
                        TokenResult::failure(device_token, e.http_status(), e.to_string())
                    }
                }
            })
            .buffer_unordered(self.max_concurrent_sends)
            .collect()
            .await
    }
}
