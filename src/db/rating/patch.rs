use sqlx::{Postgres, Transaction};

use crate::{errors::AppError, models::Rating};

/// Writes the recomputed counters back. Runs inside the vote transaction on
/// the row locked by `get_or_create_rating`.
pub async fn update_rating(
    tx: &mut Transaction<'_, Postgres>,
    rating: &mut Rating,
) -> Result<(), AppError> {
    rating.validate()?;

    let updated = sqlx::query_scalar::<_, chrono::DateTime<chrono::Utc>>(
        "UPDATE ratings
         SET total_rating = $1, total_votes = $2, avg_rating = $3, percent = $4, updated = now()
         WHERE id = $5
         RETURNING updated",
    )
    .bind(rating.total_rating)
    .bind(rating.total_votes)
    .bind(rating.avg_rating)
    .bind(rating.percent)
    .bind(rating.id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to update rating: {}", e)))?;

    rating.updated = updated;
    Ok(())
}
