use crate::{
    config::RatingConfig,
    db::rating::create_rating,
    errors::AppError,
    models::{TargetRegistry, target::TargetRef},
    state::AppState,
};

/// Every target the backfill would touch: each known instance of each kind
/// configured for auto-creation. Kind filtering and id collection happen
/// here; whether a rating is actually missing is decided by the insert.
pub async fn backfill_targets(
    config: &RatingConfig,
    targets: &TargetRegistry,
) -> Result<Vec<TargetRef>, AppError> {
    let mut candidates = Vec::new();

    for kind in &config.auto_create_for_types {
        let source = targets.source(kind)?;
        for id in source.all_ids().await? {
            candidates.push(TargetRef::new(kind.clone(), id));
        }
    }

    Ok(candidates)
}

/// Creates a zero-valued aggregate for every existing instance of the
/// configured kinds that lacks one. Safe to run repeatedly.
pub async fn create_missing_ratings(state: &AppState) -> Result<u64, AppError> {
    let candidates = backfill_targets(&state.config, &state.targets).await?;
    let mut created = 0u64;

    for target in &candidates {
        if create_rating(target, &state.postgres).await? {
            created += 1;
        }
    }

    tracing::info!(
        "Backfill checked {} targets, created {} ratings",
        candidates.len(),
        created
    );

    Ok(created)
}
