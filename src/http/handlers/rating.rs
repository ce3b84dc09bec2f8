use axum::{
    Json,
    extract::{Form, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    auth::ResolvedVoter,
    db,
    errors::AppError,
    models::{
        Rating, RatingEvent, Voter,
        rating::{MAX_STARS, format_average},
        vote::parse_vote_magnitude,
    },
    state::AppState,
};

#[derive(Deserialize)]
pub struct VotePayload {
    pub id: Option<String>,
    pub vote: Option<String>,
}

/// Records a vote. The transport status is always 200; the `code` field in
/// the JSON payload carries the real outcome, exactly what the voting widget
/// expects. Failures get a generic message, never internals.
pub async fn record_vote_handler(
    State(state): State<AppState>,
    voter: Result<ResolvedVoter, (StatusCode, String)>,
    Form(payload): Form<VotePayload>,
) -> Json<Value> {
    let voter = match voter {
        Ok(ResolvedVoter(voter)) => voter,
        Err((_, msg)) => {
            tracing::warn!("Vote rejected, identity not resolved: {}", msg);
            return Json(failure_body());
        }
    };

    match process_vote(&state, &voter, payload).await {
        Ok((rating, event)) => Json(json!({
            "code": 200,
            "total_votes": rating.total_votes,
            "avg_rating": format_average(rating.avg_rating),
            "text": result_text(&event),
        })),
        Err(err) => {
            tracing::warn!("Vote rejected: {}", err);
            Json(failure_body())
        }
    }
}

async fn process_vote(
    state: &AppState,
    voter: &Voter,
    payload: VotePayload,
) -> Result<(Rating, RatingEvent), AppError> {
    let key = payload
        .id
        .ok_or_else(|| AppError::BadRequest("Missing 'id' field".into()))?;
    let raw_vote = payload
        .vote
        .ok_or_else(|| AppError::BadRequest("Missing 'vote' field".into()))?;

    let value = parse_vote_magnitude(&raw_vote)?;

    let target = state.targets.resolve(&key).await?;

    db::vote::record_vote(
        &target,
        voter,
        value,
        state.config.voter_policy,
        &state.postgres,
    )
    .await
}

fn result_text(event: &RatingEvent) -> String {
    match event.verbal_value() {
        "" => format!("Thank you! You rated this {} of {}.", event.stars_value(), MAX_STARS),
        label => format!("Thank you! Your rating: {}.", label),
    }
}

fn failure_body() -> Value {
    json!({
        "code": 500,
        "error": "I can not save your rating, please try again later",
    })
}

/// Read-only snapshot handed to rendering code. Must not mutate anything, so
/// an absent aggregate shows up as zeros instead of being created.
#[derive(Debug, Serialize)]
pub struct RatingSnapshot {
    pub key: String,
    pub total_votes: i64,
    pub total_rating: i64,
    pub avg_rating: f64,
    pub percent: f64,
    pub max_stars: i32,
    pub user_rating: i32,
}

pub async fn show_rating_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    voter: Result<ResolvedVoter, (StatusCode, String)>,
) -> Result<Json<RatingSnapshot>, (StatusCode, String)> {
    let target = state
        .targets
        .resolve(&key)
        .await
        .map_err(|e| e.to_response())?;

    let (total_votes, total_rating, avg_rating, percent) =
        match db::rating::get_rating(&target, &state.postgres).await {
            Ok(rating) => (
                rating.total_votes,
                rating.total_rating,
                rating.avg_rating,
                rating.percent,
            ),
            Err(AppError::NotFound(_)) => (0, 0, 0.0, 0.0),
            Err(err) => return Err(err.to_response()),
        };

    let user_rating = match voter {
        Ok(ResolvedVoter(voter)) => db::vote::get_vote(&target, &voter, &state.postgres)
            .await
            .map_err(|e| e.to_response())?
            .map(|event| event.stars_value())
            .unwrap_or(0),
        Err(_) => 0,
    };

    Ok(Json(RatingSnapshot {
        key: target.key(),
        total_votes,
        total_rating,
        avg_rating,
        percent,
        max_stars: MAX_STARS,
        user_rating,
    }))
}

#[derive(Deserialize)]
pub struct TopRatedParams {
    pub limit: Option<i64>,
}

pub async fn top_rated_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<TopRatedParams>,
) -> Result<Json<Vec<Rating>>, (StatusCode, String)> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    match db::rating::list_top_rated(&kind, limit, &state.postgres).await {
        Ok(ratings) => Ok(Json(ratings)),
        Err(err) => {
            tracing::error!("Error listing top rated {}: {}", kind, err);
            Err(err.to_response())
        }
    }
}
