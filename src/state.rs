use sqlx::PgPool;
use std::sync::Arc;

use crate::{config::RatingConfig, models::TargetRegistry};

#[derive(Clone)]
pub struct AppState {
    pub postgres: PgPool,
    pub config: Arc<RatingConfig>,
    pub targets: Arc<TargetRegistry>,
}

impl AppState {
    pub fn new(postgres: PgPool, config: RatingConfig, targets: TargetRegistry) -> Self {
        Self {
            postgres,
            config: Arc::new(config),
            targets: Arc::new(targets),
        }
    }
}
