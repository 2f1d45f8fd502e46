use std::path::Path;
use std::sync::Arc;

use axum::extract::{Query, State};
use sea_orm::DbErr;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::state::AppState;
use crate::models::entity_kind::EntityKind;
use crate::models::import_job::{stage, Model as JobModel};
use crate::repos::entities::EntitiesRepo;
use crate::repos::jobs::JobsRepo;
use crate::utils::response::{APIError, APIResponse};

const IMPORT_STAGES: [&str; 7] =
    [stage::EXTRACTING, stage::USERS, stage::CHANNELS, stage::MESSAGES, stage::EMOJIS, stage::REACTIONS, stage::ATTACHMENTS];

const JOB_SCOPED_COUNTERS: [(&str, EntityKind); 3] =
    [("messages", EntityKind::Message), ("reactions", EntityKind::Reaction), ("attachments", EntityKind::Attachment)];

#[derive(Deserialize)]
pub struct JobsQuery {
    limit: Option<u64>,
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobsQuery>,
) -> Result<APIResponse, APIError> {
    let jobs_repo = JobsRepo::new(state.database.clone());
    let entities = EntitiesRepo::new(state.database.clone());

    let jobs = jobs_repo.recent(params.limit.unwrap_or(20)).await?;
    let mut out = Vec::with_capacity(jobs.len());
    for job in jobs {
        out.push(job_progress_json(&entities, job).await?);
    }
    Ok(APIResponse::json(json!({ "jobs": out })))
}

/// Renders one job with `*_processed`/`*_total` derived per the rules: stored
/// counters are trusted during import (clamped up by the live non-pending
/// count, in case a restart lost in-flight bumps), and fully recomputed from
/// the entity table once the job reaches `exporting`/`done` since progress
/// resets at export start.
pub async fn job_progress_json(entities: &EntitiesRepo, job: JobModel) -> Result<Value, DbErr> {
    let importing = IMPORT_STAGES.contains(&job.current_stage.as_str());
    let mut progress = json!({});

    for (name, kind) in JOB_SCOPED_COUNTERS {
        let stored_total = job.meta.get(format!("{name}_total")).and_then(Value::as_i64).unwrap_or(0);
        let total = if stored_total > 0 {
            stored_total
        } else {
            entities.count_for_job(job.id, kind).await? as i64
        };

        let derived_processed = entities.count_non_pending_for_job(job.id, kind).await? as i64;
        let processed = if importing {
            let stored_processed = job.meta.get(format!("{name}_processed")).and_then(Value::as_i64).unwrap_or(0);
            stored_processed.max(derived_processed)
        } else {
            derived_processed
        };

        progress[name] = json!({ "processed": processed, "total": total });
    }

    let emojis_total = job.meta.get("emojis_total").and_then(Value::as_i64).unwrap_or(0);
    let emojis_processed = job.meta.get("emojis_processed").and_then(Value::as_i64).unwrap_or(0);
    progress["emojis"] = json!({ "processed": emojis_processed, "total": emojis_total });

    progress["json_files"] = json!({
        "processed": job.meta.get("json_files_processed").and_then(Value::as_i64).unwrap_or(0),
        "total": derive_json_files_total(&job),
    });

    Ok(json!({
        "id": job.id,
        "status": job.status,
        "current_stage": job.current_stage,
        "error_message": job.error_message,
        "created_at": job.created_at.to_rfc3339(),
        "updated_at": job.updated_at.to_rfc3339(),
        "progress": progress,
    }))
}

/// `json_files_total` is normally set right after extraction; for the brief
/// window before that (or if a restart wiped the counter) fall back to
/// counting the still-present transient extract directory, if any.
fn derive_json_files_total(job: &JobModel) -> i64 {
    if let Some(stored) = job.meta.get("json_files_total").and_then(Value::as_i64) {
        if stored > 0 {
            return stored;
        }
    }
    let Some(dir) = job.meta.get("extract_dir").and_then(Value::as_str) else {
        return 0;
    };
    count_json_files_best_effort(Path::new(dir))
}

fn count_json_files_best_effort(dir: &Path) -> i64 {
    crate::import::zip_extract::count_json_files(dir).map(|n| n as i64).unwrap_or(0)
}
