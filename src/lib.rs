pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod http;
pub mod middleware;
pub mod models;
pub mod state;

use axum::{Router, middleware as axum_middleware};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};

use crate::{
    config::RatingConfig,
    middleware::{cors_layer, create_global_rate_limiter, rate_limit_middleware},
    models::{TargetRegistry, target::TrustedKind},
    state::AppState,
};

/// Runs cleanup once a day; a missed run only delays deletion.
const CLEANUP_INTERVAL_SECONDS: u64 = 86_400;

/// Boots the rating service. Embedders register a `TargetSource` per rated
/// entity kind before calling this; kinds listed in `RATING_TARGET_KINDS`
/// are accepted without one.
pub async fn start_server(mut targets: TargetRegistry) {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = RatingConfig::from_env().expect("Invalid rating configuration");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let postgres = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&postgres)
        .await
        .expect("Failed to run migrations");

    for kind in &config.trusted_kinds {
        if targets.source(kind).is_err() {
            targets.register(kind.clone(), Arc::new(TrustedKind));
        }
    }

    let retention_seconds = config.retention_seconds;
    let state = AppState::new(postgres.clone(), config, targets);

    // Kinds configured for auto-creation get their missing aggregates filled
    // in at startup; a failure here is logged, not fatal.
    if !state.config.auto_create_for_types.is_empty() {
        match db::backfill::create_missing_ratings(&state).await {
            Ok(created) => tracing::info!("Startup backfill created {} ratings", created),
            Err(e) => tracing::error!("Startup backfill failed: {}", e),
        }
    }

    // Retention job: old aggregates and their votes go together.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECONDS));
        loop {
            interval.tick().await;
            if let Err(e) = db::cleanup::cleanup_old_ratings(retention_seconds, &postgres).await {
                tracing::error!("Cleanup job failed: {}", e);
            }
        }
    });

    let global_rate_limiter = create_global_rate_limiter();

    let app = Router::new()
        .merge(http::create_http_routes(state))
        .layer(axum_middleware::from_fn(move |req, next| {
            rate_limit_middleware(global_rate_limiter.clone(), req, next)
        }))
        .layer(cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .fallback(|| async { "404 Not Found" });

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3001);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("Failed to bind address");

    tracing::info!("Star ratings server listening on port {}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
