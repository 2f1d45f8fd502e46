use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::models::entity::Model as EntityModel;
use crate::models::entity_kind::EntityKind;
use crate::models::status_enum::MappingStatus;
use crate::repos::entities::EntitiesRepo;

use super::ctx::ExportOutcome;
use super::error::ExportError;

/// Runs `export_fn` over every entity with bounded concurrency, persisting
/// each outcome via `update_status` as it completes. One failing entity never
/// aborts the batch — its error is recorded and the pool moves on.
pub async fn run_export_pool<F, Fut>(
    entities: Vec<EntityModel>,
    concurrency: usize,
    entities_repo: EntitiesRepo,
    kind: EntityKind,
    export_fn: F,
) where
    F: Fn(EntityModel) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<ExportOutcome, ExportError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = FuturesUnordered::new();

    for entity in entities {
        let semaphore = semaphore.clone();
        let export_fn = export_fn.clone();
        let entities_repo = entities_repo.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let slack_id = entity.slack_id.clone();
            let job_id = entity.job_id;
            let outcome = export_fn(entity).await;
            persist_outcome(&entities_repo, kind, &slack_id, job_id, outcome).await;
        }));
    }

    while let Some(joined) = tasks.next().await {
        if let Err(e) = joined {
            error!(error = %e, "export worker task panicked");
        }
    }
}

async fn persist_outcome(
    entities_repo: &EntitiesRepo,
    kind: EntityKind,
    slack_id: &str,
    job_id: Option<i64>,
    outcome: Result<ExportOutcome, ExportError>,
) {
    let result = match outcome {
        Ok(ExportOutcome::Success(mattermost_id)) => {
            entities_repo
                .update_status(kind, slack_id, job_id, MappingStatus::Success, None, Some(mattermost_id))
                .await
        }
        Ok(ExportOutcome::Skipped(reason)) => {
            warn!(kind = %kind, slack_id, reason, "export skipped");
            entities_repo.update_status(kind, slack_id, job_id, MappingStatus::Skipped, Some(reason), None).await
        }
        Err(e) => {
            error!(kind = %kind, slack_id, error = %e, "export failed");
            entities_repo
                .update_status(kind, slack_id, job_id, MappingStatus::Failed, Some(e.to_string()), None)
                .await
        }
    };
    if let Err(e) = result {
        error!(kind = %kind, slack_id, error = %e, "failed to persist export outcome");
    }
}
