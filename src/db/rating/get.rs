use sqlx::{PgPool, Postgres, Transaction};

use crate::{errors::AppError, models::Rating, models::target::TargetRef};

const RATING_COLUMNS: &str =
    "id, target_kind, target_id, total_rating, total_votes, avg_rating, percent, created, updated";

/// Looks up the aggregate for a target without creating one. Absent rows are
/// a NotFound, for callers that asked for no-create semantics.
pub async fn get_rating(target: &TargetRef, postgres: &PgPool) -> Result<Rating, AppError> {
    let rating = sqlx::query_as::<_, Rating>(&format!(
        "SELECT {} FROM ratings WHERE target_kind = $1 AND target_id = $2",
        RATING_COLUMNS
    ))
    .bind(&target.kind)
    .bind(target.id)
    .fetch_optional(postgres)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to fetch rating: {}", e)))?;

    rating.ok_or_else(|| AppError::NotFound(format!("No rating for target {}", target.key())))
}

/// Loads the aggregate row inside the vote transaction, creating it on first
/// access. The returned row is locked FOR UPDATE; that lock is what
/// serializes concurrent votes on the same target.
pub async fn get_or_create_rating(
    tx: &mut Transaction<'_, Postgres>,
    target: &TargetRef,
) -> Result<Rating, AppError> {
    if let Some(rating) = fetch_locked(tx, target).await? {
        return Ok(rating);
    }

    let inserted = sqlx::query_as::<_, Rating>(&format!(
        "INSERT INTO ratings (target_kind, target_id) VALUES ($1, $2)
         ON CONFLICT (target_kind, target_id) DO NOTHING
         RETURNING {}",
        RATING_COLUMNS
    ))
    .bind(&target.kind)
    .bind(target.id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to create rating: {}", e)))?;

    if let Some(rating) = inserted {
        return Ok(rating);
    }

    // A concurrent request inserted the row between our lookup and insert.
    // The second lookup blocks on its lock and then sees the committed row.
    fetch_locked(tx, target).await?.ok_or_else(|| {
        AppError::UniquenessConflict(format!(
            "Concurrent rating insert for target {} did not settle",
            target.key()
        ))
    })
}

async fn fetch_locked(
    tx: &mut Transaction<'_, Postgres>,
    target: &TargetRef,
) -> Result<Option<Rating>, AppError> {
    sqlx::query_as::<_, Rating>(&format!(
        "SELECT {} FROM ratings WHERE target_kind = $1 AND target_id = $2 FOR UPDATE",
        RATING_COLUMNS
    ))
    .bind(&target.kind)
    .bind(target.id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to fetch rating: {}", e)))
}

/// Aggregates for one kind, best average first. Recovered ordering helper
/// for "top rated" listings.
pub async fn list_top_rated(
    kind: &str,
    limit: i64,
    postgres: &PgPool,
) -> Result<Vec<Rating>, AppError> {
    sqlx::query_as::<_, Rating>(&format!(
        "SELECT {} FROM ratings WHERE target_kind = $1
         ORDER BY avg_rating DESC, target_id ASC LIMIT $2",
        RATING_COLUMNS
    ))
    .bind(kind)
    .bind(limit)
    .fetch_all(postgres)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to list ratings: {}", e)))
}
