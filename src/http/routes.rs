use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    http::handlers::{record_vote_handler, show_rating_handler, top_rated_handler},
    state::AppState,
};

pub fn create_http_routes(state: AppState) -> Router {
    Router::new()
        .route("/submit", post(record_vote_handler))
        .route("/ratings/{key}", get(show_rating_handler))
        .route("/ratings/top/{kind}", get(top_rated_handler))
        .with_state(state)
}
