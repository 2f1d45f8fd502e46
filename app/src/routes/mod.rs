pub mod export;
pub mod healthcheck;
pub mod jobs;
pub mod progress;
pub mod stats;
pub mod upload;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::{core::state::AppState, utils::global_error_handler::global_error_handler};

pub fn create_routers(state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/upload", post(upload::upload))
        .route("/export", post(export::start_export))
        .route("/jobs", get(jobs::list_jobs))
        .route("/stats/mappings", get(stats::mapping_stats))
        .route("/progress/stream", get(progress::stream))
        .route("/healthcheck", get(healthcheck::healthcheck))
        .fallback(global_error_handler)
        .with_state(state)
}
