//! Repository for the `push_delivery_attempts` table.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::delivery::{NewDeliveryAttempt, PushDeliveryAttempt};

/// Column list for `push_delivery_attempts` queries.
const COLUMNS: &str = "id, delivery_id, push_token, success, http_status, error, created_at";

/// Provides per-token attempt tracking.
pub struct DeliveryAttemptRepo;

impl DeliveryAttemptRepo {
    /// Record the per-token results of one dispatch in a transaction.
    pub async fn create_many(
        pool: &PgPool,
        delivery_id: DbId,
        attempts: &[NewDeliveryAttempt],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for attempt in attempts {
            sqlx::query(
                "INSERT INTO push_delivery_attempts \
                    (delivery_id, push_token, success, http_status, error) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(delivery_id)
            .bind(&attempt.push_token)
            .bind(attempt.success)
            .bind(attempt.http_status)
            .bind(&attempt.error)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All attempts for a delivery, oldest first.
    pub async fn list_for_delivery(
        pool: &PgPool,
        delivery_id: DbId,
    ) -> Result<Vec<PushDeliveryAttempt>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM push_delivery_attempts \
             WHERE delivery_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, PushDeliveryAttempt>(&query)
            .bind(delivery_id)
            .fetch_all(pool)
            .await
    }
}
