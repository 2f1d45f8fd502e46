use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::core::runtime::Runtime;
use crate::models::entity::Model as EntityModel;
use crate::models::entity_kind::EntityKind;

use super::cache::ExportCache;
use super::channel_scheduler::run_channel_scheduler;
use super::ctx::ExportCtx;
use super::error::ExportError;
use super::exporters::attachment::export_attachment;
use super::exporters::channel::export_channel;
use super::exporters::emoji::export_custom_emoji;
use super::exporters::reaction::export_reaction;
use super::exporters::user::export_user;
use super::worker_pool::run_export_pool;

/// Runs the global type-barrier scheduler (spec 4.5): one pass over every
/// `running/exporting` job, advancing strictly through `user -> custom_emoji
/// -> channel -> attachment -> message -> reaction`, until no running job
/// remains (optionally bounded to `(created_at, id) <= anchor_job_id`).
/// Serializes on `rt.export_lock` so at most one instance runs at a time.
pub async fn orchestrate_export(rt: Runtime, anchor_job_id: Option<i64>) -> Result<(), ExportError> {
    let _guard = rt.export_lock.lock().await;
    let ctx = ExportCtx::new(rt.clone());
    let poll = Duration::from_secs_f64(rt.config.export_queue_poll.max(0.0));

    loop {
        let jobs = ctx.jobs.running_exporting(anchor_job_id).await?;
        if jobs.is_empty() {
            match ctx.jobs.earliest_running(anchor_job_id).await? {
                None => {
                    info!("export orchestrator: no running jobs remain, exiting");
                    return Ok(());
                }
                Some(_) => {
                    tokio::time::sleep(poll).await;
                    continue;
                }
            }
        }

        let job_ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
        info!(batch = ?job_ids, "export orchestrator: starting barrier batch");

        for kind in EntityKind::EXPORT_ORDER {
            run_barrier(&ctx, kind, &job_ids).await?;
        }

        for job in &jobs {
            ctx.jobs.mark_done(job.id).await?;
        }
        info!(batch = ?job_ids, "export orchestrator: batch complete");
    }
}

/// Exports every pending row of `kind` across `job_ids`, repeating until none
/// remain (covers jobs that reach `exporting` mid-barrier). Global types run
/// one pool over the whole union; job-scoped types run one pool per job, in
/// the batch's FIFO order.
async fn run_barrier(ctx: &ExportCtx, kind: EntityKind, job_ids: &[i64]) -> Result<(), ExportError> {
    loop {
        let pending = ctx.entities.pending_for_jobs(kind, job_ids).await?;
        if pending.is_empty() {
            return Ok(());
        }

        match kind {
            EntityKind::User => {
                let ctx_c = ctx.clone();
                run_export_pool(pending, ctx.rt.config.export_workers, ctx.entities.clone(), kind, move |e| {
                    let ctx = ctx_c.clone();
                    async move { export_user(&ctx, &e).await }
                })
                .await;
            }
            EntityKind::CustomEmoji => {
                let ctx_c = ctx.clone();
                run_export_pool(pending, ctx.rt.config.export_workers, ctx.entities.clone(), kind, move |e| {
                    let ctx = ctx_c.clone();
                    async move { export_custom_emoji(&ctx, &e).await }
                })
                .await;
            }
            EntityKind::Channel => {
                let ctx_c = ctx.clone();
                run_export_pool(pending, ctx.rt.config.export_workers, ctx.entities.clone(), kind, move |e| {
                    let ctx = ctx_c.clone();
                    async move { export_channel(&ctx, &e).await }
                })
                .await;
            }
            EntityKind::Attachment => {
                for job_id in job_ids {
                    let rows: Vec<_> = pending.iter().filter(|e| e.job_id == Some(*job_id)).cloned().collect();
                    if rows.is_empty() {
                        continue;
                    }
                    let ctx_c = ctx.clone();
                    run_export_pool(
                        rows,
                        ctx.rt.config.attachment_workers(),
                        ctx.entities.clone(),
                        kind,
                        move |e| {
                            let ctx = ctx_c.clone();
                            async move { export_attachment(&ctx, &e).await }
                        },
                    )
                    .await;
                }
            }
            EntityKind::Reaction => {
                let cache = Arc::new(ExportCache::new());
                for job_id in job_ids {
                    let mut rows: Vec<_> = pending.iter().filter(|e| e.job_id == Some(*job_id)).cloned().collect();
                    if rows.is_empty() {
                        continue;
                    }
                    rows.sort_by(|a, b| reaction_ts(a).total_cmp(&reaction_ts(b)));
                    let ctx_c = ctx.clone();
                    let cache_c = cache.clone();
                    run_export_pool(rows, ctx.rt.config.export_workers, ctx.entities.clone(), kind, move |e| {
                        let ctx = ctx_c.clone();
                        let cache = cache_c.clone();
                        async move { export_reaction(&ctx, &cache, &e).await }
                    })
                    .await;
                }
            }
            EntityKind::Message => {
                let cache = Arc::new(ExportCache::new());
                let concurrency = ctx.rt.config.export_channel_concurrency();
                for job_id in job_ids {
                    run_channel_scheduler(ctx, cache.clone(), *job_id, concurrency).await;
                }
            }
        }
    }
}

/// Parsed `message_ts` for one reaction entity; malformed or missing values
/// sort last, same convention as the channel scheduler's message ordering.
fn reaction_ts(entity: &EntityModel) -> f64 {
    entity
        .raw_data
        .get("message_ts")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::INFINITY)
}
