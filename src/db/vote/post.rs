use sqlx::{Acquire, PgPool, Postgres, Transaction};

use crate::{
    config::VoterPolicy,
    db::rating::{get_or_create_rating, update_rating},
    db::vote::get::EVENT_COLUMNS,
    errors::{AppError, is_unique_violation},
    models::{Rating, RatingEvent, Voter, target::TargetRef, vote::validate_vote_value},
};

/// Applies one vote to a target: get-or-create the voter's vote record,
/// get-or-create the aggregate, fold the vote in and persist both. The whole
/// read-compute-write runs in one transaction; any failure rolls everything
/// back and nothing partial becomes visible.
pub async fn record_vote(
    target: &TargetRef,
    voter: &Voter,
    value: i32,
    policy: VoterPolicy,
    postgres: &PgPool,
) -> Result<(Rating, RatingEvent), AppError> {
    validate_vote_value(value)?;
    voter.check_policy(policy)?;

    let mut tx = postgres
        .begin()
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

    let mut event = get_or_create_event(&mut tx, target, voter).await?;
    let mut rating = get_or_create_rating(&mut tx, target).await?;

    // Snapshot the prior value before overwriting so a re-vote takes the old
    // contribution back out of the aggregate instead of double-counting.
    if event.value > 0 {
        event.is_changing = true;
        event.old_value = event.value;
    }
    event.value = value;

    rating.add_rating(&event)?;

    update_rating(&mut tx, &mut rating).await?;
    update_event(&mut tx, &mut event).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to commit vote: {}", e)))?;

    tracing::info!(
        "Recorded vote {} on {}: {} votes, avg {}",
        value,
        target.key(),
        rating.total_votes,
        rating.avg_rating
    );

    Ok((rating, event))
}

/// Get-or-create by the voter's uniqueness key. The partial unique indexes
/// make concurrent first-votes collide at the storage layer; the benign case
/// (someone else just created the row) is absorbed by one retried lookup,
/// anything past that surfaces as a conflict. The insert runs under a
/// savepoint so a violation does not poison the outer transaction.
async fn get_or_create_event(
    tx: &mut Transaction<'_, Postgres>,
    target: &TargetRef,
    voter: &Voter,
) -> Result<RatingEvent, AppError> {
    if let Some(event) = fetch_event_locked(tx, target, voter).await? {
        return Ok(event);
    }

    let mut savepoint = tx
        .begin()
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to open savepoint: {}", e)))?;

    let inserted = sqlx::query_as::<_, RatingEvent>(&format!(
        "INSERT INTO rating_events (target_kind, target_id, ip, user_id)
         VALUES ($1, $2, $3, $4)
         RETURNING {}",
        EVENT_COLUMNS
    ))
    .bind(&target.kind)
    .bind(target.id)
    .bind(&voter.ip)
    .bind(voter.user_id)
    .fetch_one(&mut *savepoint)
    .await;

    match inserted {
        Ok(event) => {
            savepoint.commit().await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to release savepoint: {}", e))
            })?;
            Ok(event)
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback().await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to roll back savepoint: {}", e))
            })?;
            // Someone else created the record between our lookup and insert.
            // Retry the lookup exactly once and take over their row.
            fetch_event_locked(tx, target, voter).await?.ok_or_else(|| {
                AppError::UniquenessConflict(format!(
                    "Concurrent vote insert for target {} did not settle",
                    target.key()
                ))
            })
        }
        Err(e) => Err(AppError::DatabaseError(format!(
            "Failed to create vote record: {}",
            e
        ))),
    }
}

async fn fetch_event_locked(
    tx: &mut Transaction<'_, Postgres>,
    target: &TargetRef,
    voter: &Voter,
) -> Result<Option<RatingEvent>, AppError> {
    let query = match voter.user_id {
        Some(_) => format!(
            "SELECT {} FROM rating_events
             WHERE target_kind = $1 AND target_id = $2 AND user_id = $3 FOR UPDATE",
            EVENT_COLUMNS
        ),
        None => format!(
            "SELECT {} FROM rating_events
             WHERE target_kind = $1 AND target_id = $2 AND user_id IS NULL AND ip = $3 FOR UPDATE",
            EVENT_COLUMNS
        ),
    };

    let mut q = sqlx::query_as::<_, RatingEvent>(&query)
        .bind(&target.kind)
        .bind(target.id);
    q = match voter.user_id {
        Some(user_id) => q.bind(user_id),
        None => q.bind(&voter.ip),
    };

    q.fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch vote record: {}", e)))
}

async fn update_event(
    tx: &mut Transaction<'_, Postgres>,
    event: &mut RatingEvent,
) -> Result<(), AppError> {
    let updated = sqlx::query_scalar::<_, chrono::DateTime<chrono::Utc>>(
        "UPDATE rating_events SET value = $1, updated = now() WHERE id = $2 RETURNING updated",
    )
    .bind(event.value)
    .bind(event.id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to update vote record: {}", e)))?;

    event.updated = updated;
    Ok(())
}
