use sqlx::PgPool;

use crate::{
    errors::AppError,
    models::{RatingEvent, Voter, target::TargetRef},
};

pub(crate) const EVENT_COLUMNS: &str =
    "id, target_kind, target_id, ip, user_id, value, created, updated";

/// The caller's current vote for a target, if any. Read-only, used by the
/// display snapshot; never creates a record.
pub async fn get_vote(
    target: &TargetRef,
    voter: &Voter,
    postgres: &PgPool,
) -> Result<Option<RatingEvent>, AppError> {
    let query = match voter.user_id {
        Some(_) => format!(
            "SELECT {} FROM rating_events
             WHERE target_kind = $1 AND target_id = $2 AND user_id = $3",
            EVENT_COLUMNS
        ),
        None => format!(
            "SELECT {} FROM rating_events
             WHERE target_kind = $1 AND target_id = $2 AND user_id IS NULL AND ip = $3",
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

    q.fetch_optional(postgres)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch vote: {}", e)))
}
