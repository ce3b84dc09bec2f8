use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::errors::AppError;

/// Ratings whose last update is at or before this instant are due for
/// deletion.
pub fn cleanup_cutoff(now: DateTime<Utc>, retention_seconds: u64) -> DateTime<Utc> {
    now - Duration::seconds(retention_seconds as i64)
}

/// Deletes aggregates untouched for longer than the retention window,
/// together with all vote records for the same targets. One transaction so
/// a rating never outlives its votes or vice versa.
pub async fn cleanup_old_ratings(
    retention_seconds: u64,
    postgres: &PgPool,
) -> Result<(u64, u64), AppError> {
    let cutoff = cleanup_cutoff(Utc::now(), retention_seconds);

    let mut tx = postgres
        .begin()
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to begin cleanup: {}", e)))?;

    let events = sqlx::query(
        "DELETE FROM rating_events e
         USING ratings r
         WHERE r.target_kind = e.target_kind
           AND r.target_id = e.target_id
           AND r.updated <= $1",
    )
    .bind(cutoff)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to delete old votes: {}", e)))?;

    let ratings = sqlx::query("DELETE FROM ratings WHERE updated <= $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to delete old ratings: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to commit cleanup: {}", e)))?;

    let deleted = (ratings.rows_affected(), events.rows_affected());
    if deleted.0 > 0 {
        tracing::info!(
            "Cleanup removed {} ratings and {} vote records older than {}",
            deleted.0,
            deleted.1,
            cutoff
        );
    }

    Ok(deleted)
}
