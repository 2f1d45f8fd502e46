use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::error;

use crate::models::entity::Model as EntityModel;
use crate::models::entity_kind::EntityKind;
use crate::models::relation_type::relation;
use crate::models::status_enum::MappingStatus;

use super::cache::ExportCache;
use super::ctx::{ExportCtx, ExportOutcome};
use super::exporters::message::export_message;

const UNASSIGNED_GROUP: i64 = -1;

fn parse_ts(entity: &EntityModel) -> f64 {
    entity
        .raw_data
        .get("ts")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::INFINITY)
}

async fn group_by_channel(ctx: &ExportCtx, messages: Vec<EntityModel>) -> Vec<(i64, Vec<EntityModel>)> {
    let mut groups: HashMap<i64, Vec<EntityModel>> = HashMap::new();
    for message in messages {
        let channel_key = match ctx.relations.to_entity_via(message.id, relation::POSTED_IN).await {
            Ok(Some(channel)) => channel.id,
            Ok(None) => UNASSIGNED_GROUP,
            Err(e) => {
                error!(message = %message.slack_id, error = %e, "failed to resolve channel for message, grouping as unassigned");
                UNASSIGNED_GROUP
            }
        };
        groups.entry(channel_key).or_default().push(message);
    }
    groups.into_iter().collect()
}

async fn is_reply(ctx: &ExportCtx, message: &EntityModel) -> bool {
    matches!(ctx.relations.to_entity_via(message.id, relation::THREAD_REPLY).await, Ok(Some(_)))
}

/// Exports every non-`success` job-scoped message, grouped by channel and run
/// one async task per channel (bounded by `concurrency`), processing roots
/// before replies within each channel so thread `root_id`s resolve.
pub async fn run_channel_scheduler(ctx: &ExportCtx, cache: Arc<ExportCache>, job_id: i64, concurrency: usize) {
    let messages = match ctx.entities.non_success_for_job(EntityKind::Message, job_id).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(job_id, error = %e, "failed to load job-scoped messages for export");
            return;
        }
    };
    if messages.is_empty() {
        return;
    }

    let mut groups = group_by_channel(ctx, messages).await;
    for (_, group) in &mut groups {
        let mut keyed = Vec::with_capacity(group.len());
        for message in group.drain(..) {
            let reply = is_reply(ctx, &message).await;
            keyed.push((reply, parse_ts(&message), message));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        *group = keyed.into_iter().map(|(_, _, m)| m).collect();
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(groups.len());
    for (_, group) in groups {
        let semaphore = semaphore.clone();
        let ctx = ctx.clone();
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            for message in group {
                let slack_id = message.slack_id.clone();
                let outcome = export_message(&ctx, &cache, &message).await;
                persist(&ctx, &slack_id, job_id, outcome).await;
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "channel export task panicked");
        }
    }
}

async fn persist(ctx: &ExportCtx, slack_id: &str, job_id: i64, outcome: Result<ExportOutcome, super::error::ExportError>) {
    let result = match outcome {
        Ok(ExportOutcome::Success(mattermost_id)) => {
            ctx.entities
                .update_status(EntityKind::Message, slack_id, Some(job_id), MappingStatus::Success, None, Some(mattermost_id))
                .await
        }
        Ok(ExportOutcome::Skipped(reason)) => {
            ctx.entities
                .update_status(EntityKind::Message, slack_id, Some(job_id), MappingStatus::Skipped, Some(reason), None)
                .await
        }
        Err(e) => {
            error!(slack_id, error = %e, "message export failed");
            ctx.entities
                .update_status(EntityKind::Message, slack_id, Some(job_id), MappingStatus::Failed, Some(e.to_string()), None)
                .await
        }
    };
    if let Err(e) = result {
        error!(slack_id, error = %e, "failed to persist message export outcome");
    }
}
