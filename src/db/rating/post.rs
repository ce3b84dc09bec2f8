use sqlx::PgPool;

use crate::{errors::AppError, models::target::TargetRef, state::AppState};

/// Inserts a zero-valued aggregate for a target if none exists yet. Returns
/// whether a row was actually created.
pub async fn create_rating(target: &TargetRef, postgres: &PgPool) -> Result<bool, AppError> {
    let result = sqlx::query(
        "INSERT INTO ratings (target_kind, target_id) VALUES ($1, $2)
         ON CONFLICT (target_kind, target_id) DO NOTHING",
    )
    .bind(&target.kind)
    .bind(target.id)
    .execute(postgres)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to create rating: {}", e)))?;

    Ok(result.rows_affected() > 0)
}

/// Explicit post-create hook for collaborators: call it after creating a
/// target instance and the zero aggregate appears for kinds configured for
/// auto-creation.
pub async fn on_target_created(state: &AppState, target: &TargetRef) -> Result<(), AppError> {
    if !state.config.auto_creates(&target.kind) {
        return Ok(());
    }

    if create_rating(target, &state.postgres).await? {
        tracing::info!("Created rating for new target {}", target.key());
    }
    Ok(())
}
