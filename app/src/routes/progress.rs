use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::core::state::AppState;
use crate::repos::entities::EntitiesRepo;
use crate::repos::jobs::JobsRepo;

use super::jobs::job_progress_json;
use super::stats::mapping_stats_json;

#[derive(Deserialize)]
pub struct ProgressQuery {
    interval: Option<f64>,
}

const MIN_INTERVAL_SECS: f64 = 0.25;

/// One `stats` event per tick: mapping stats merged with the most recent
/// job's derived progress. Ends (after one `error` event) if a query fails,
/// rather than retrying indefinitely against a possibly-down database.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProgressQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let interval = Duration::from_secs_f64(params.interval.unwrap_or(1.0).max(MIN_INTERVAL_SECS));
    let jobs_repo = JobsRepo::new(state.database.clone());
    let entities_repo = EntitiesRepo::new(state.database.clone());

    let ticks = stream::unfold(Some((jobs_repo, entities_repo)), move |live| async move {
        let (jobs_repo, entities_repo) = live?;
        tokio::time::sleep(interval).await;

        match build_tick(&jobs_repo, &entities_repo).await {
            Ok(payload) => {
                let event = Event::default()
                    .event("stats")
                    .json_data(payload)
                    .unwrap_or_else(|_| Event::default().event("error").data("failed to encode stats"));
                Some((event, Some((jobs_repo, entities_repo))))
            }
            Err(e) => {
                let event = Event::default().event("error").data(e.to_string());
                Some((event, None))
            }
        }
    })
    .map(Ok);

    Sse::new(ticks).keep_alive(KeepAlive::default())
}

async fn build_tick(jobs_repo: &JobsRepo, entities_repo: &EntitiesRepo) -> Result<serde_json::Value, sea_orm::DbErr> {
    let mut stats = mapping_stats_json(entities_repo).await?;

    let job = match jobs_repo.recent(1).await?.into_iter().next() {
        Some(job) => job_progress_json(entities_repo, job).await?,
        None => json!(null),
    };
    stats["job"] = job;
    Ok(stats)
}
