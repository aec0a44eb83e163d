//! Repository for the `push_deliveries` table.
//!
//! Every status change is guarded by `status = 'NEW'`, so a record that has
//! reached `SENT` or `FAILED` is never written back. Dispatch results are
//! also guarded by the `claim_token` handed out by [`PushDeliveryRepo::claim`],
//! so a dispatcher whose lease was taken over cannot overwrite the new
//! owner's outcome.

use beacon_core::search::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use beacon_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::delivery::{DeliveryFilter, NewPushDelivery, PushDelivery};

/// Column list for `push_deliveries` queries.
const COLUMNS: &str = "id, subject, body, target_user, broadcast, status, rule_id, \
    reference_document_type, reference_document_name, attempt_count, claimed_until, \
    claim_token, sent_at, last_error, created_at, updated_at";

/// Provides storage and state transitions for push delivery records.
pub struct PushDeliveryRepo;

impl PushDeliveryRepo {
    /// Insert a record in status `NEW`. Runs on the caller's transaction.
    pub async fn create(
        conn: &mut PgConnection,
        input: &NewPushDelivery,
    ) -> Result<PushDelivery, sqlx::Error> {
        let query = format!(
            "INSERT INTO push_deliveries \
                (subject, body, target_user, broadcast, rule_id, \
                 reference_document_type, reference_document_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PushDelivery>(&query)
            .bind(&input.subject)
            .bind(&input.body)
            .bind(&input.target_user)
            .bind(input.broadcast)
            .bind(input.rule_id)
            .bind(&input.reference_document_type)
            .bind(&input.reference_document_name)
            .fetch_one(conn)
            .await
    }

    /// Find a record by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PushDelivery>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM push_deliveries WHERE id = $1");
        sqlx::query_as::<_, PushDelivery>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List records, newest first, optionally filtered by status and target.
    pub async fn list(
        pool: &PgPool,
        filter: &DeliveryFilter,
    ) -> Result<Vec<PushDelivery>, sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_idx: usize = 0;

        if filter.status.is_some() {
            param_idx += 1;
            conditions.push(format!("status = ${param_idx}"));
        }
        if filter.target_user.is_some() {
            param_idx += 1;
            conditions.push(format!("target_user = ${param_idx}"));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit_idx = param_idx + 1;
        let offset_idx = param_idx + 2;
        let query = format!(
            "SELECT {COLUMNS} FROM push_deliveries {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${limit_idx} OFFSET ${offset_idx}"
        );

        let mut q = sqlx::query_as::<_, PushDelivery>(&query);
        if let Some(ref status) = filter.status {
            q = q.bind(status);
        }
        if let Some(ref user) = filter.target_user {
            q = q.bind(user);
        }
        q.bind(clamp_limit(filter.limit, DEFAULT_LIMIT, MAX_LIMIT))
            .bind(clamp_offset(filter.offset))
            .fetch_all(pool)
            .await
    }

    /// Claim a `NEW` record for dispatch by setting a lease.
    ///
    /// Every successful claim bumps `claim_token`; the returned row carries
    /// the new value, which later updates must present. Returns `None` when
    /// the record does not exist, is no longer `NEW`, or holds a live lease
    /// owned by another dispatcher.
    pub async fn claim(
        pool: &PgPool,
        id: DbId,
        lease_secs: i64,
    ) -> Result<Option<PushDelivery>, sqlx::Error> {
        let query = format!(
            "UPDATE push_deliveries \
             SET claimed_until = NOW() + make_interval(secs => $2), \
                 claim_token = claim_token + 1, updated_at = NOW() \
             WHERE id = $1 AND status = 'NEW' \
               AND (claimed_until IS NULL OR claimed_until < NOW()) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PushDelivery>(&query)
            .bind(id)
            .bind(lease_secs as f64)
            .fetch_optional(pool)
            .await
    }

    /// Extend the lease held under `claim_token`.
    ///
    /// Returns `false` once another claim has taken the record over or the
    /// record has left `NEW`.
    pub async fn renew_claim(
        pool: &PgPool,
        id: DbId,
        claim_token: i64,
        lease_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE push_deliveries \
             SET claimed_until = NOW() + make_interval(secs => $3) \
             WHERE id = $1 AND claim_token = $2 AND status = 'NEW'",
        )
        .bind(id)
        .bind(claim_token)
        .bind(lease_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a record to `SENT`, counting the attempt and releasing the lease.
    ///
    /// `last_error` keeps any partial-failure detail. Returns `false` if the
    /// record was not `NEW` or `claim_token` is no longer current.
    pub async fn mark_sent(
        pool: &PgPool,
        id: DbId,
        claim_token: i64,
        last_error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE push_deliveries \
             SET status = 'SENT', sent_at = NOW(), attempt_count = attempt_count + 1, \
                 claimed_until = NULL, last_error = $3, updated_at = NOW() \
             WHERE id = $1 AND claim_token = $2 AND status = 'NEW'",
        )
        .bind(id)
        .bind(claim_token)
        .bind(last_error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count an unsuccessful attempt: the record stays `NEW`, the lease is
    /// released and `last_error` is replaced. Same claim check as
    /// [`mark_sent`](Self::mark_sent).
    pub async fn record_failed_attempt(
        pool: &PgPool,
        id: DbId,
        claim_token: i64,
        last_error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE push_deliveries \
             SET attempt_count = attempt_count + 1, claimed_until = NULL, \
                 last_error = $3, updated_at = NOW() \
             WHERE id = $1 AND claim_token = $2 AND status = 'NEW'",
        )
        .bind(id)
        .bind(claim_token)
        .bind(last_error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move unleased `NEW` records that used up their attempts to `FAILED`.
    ///
    /// Returns the ids that changed.
    pub async fn mark_exhausted(pool: &PgPool, max_attempts: i32) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE push_deliveries \
             SET status = 'FAILED', claimed_until = NULL, updated_at = NOW() \
             WHERE status = 'NEW' AND attempt_count >= $1 \
               AND (claimed_until IS NULL OR claimed_until < NOW()) \
             RETURNING id",
        )
        .bind(max_attempts)
        .fetch_all(pool)
        .await
    }

    /// Ids of unleased `NEW` records with attempts left that were last
    /// touched at least `min_age_secs` ago, oldest first.
    pub async fn list_retryable(
        pool: &PgPool,
        max_attempts: i32,
        min_age_secs: i64,
        limit: i64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM push_deliveries \
             WHERE status = 'NEW' AND attempt_count < $1 \
               AND (claimed_until IS NULL OR claimed_until < NOW()) \
               AND updated_at <= NOW() - make_interval(secs => $2) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3",
        )
        .bind(max_attempts)
        .bind(min_age_secs as f64)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
