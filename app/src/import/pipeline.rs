use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{error, info};

use crate::core::runtime::Runtime;
use crate::models::import_job::stage;
use crate::models::job_status_enum::JobStatus;
use crate::repos::entities::EntitiesRepo;
use crate::repos::jobs::JobsRepo;
use crate::repos::relations::RelationsRepo;

use super::attachments::import_attachments;
use super::channels::import_channels;
use super::emojis::import_emojis;
use super::error::ImportError;
use super::messages::{import_messages, precompute_totals};
use super::reactions::import_reactions;
use super::users::import_users;
use super::zip_extract::{count_json_files, extract_zip};

/// Collaborators threaded through every import stage. Cheap to clone — each
/// repo wraps the same pooled `DatabaseConnection` the `Runtime` carries.
#[derive(Clone)]
pub struct PipelineCtx {
    pub rt: Runtime,
    pub entities: EntitiesRepo,
    pub relations: RelationsRepo,
    pub jobs: JobsRepo,
    pub job_id: i64,
}

impl PipelineCtx {
    pub fn new(rt: Runtime, job_id: i64) -> Self {
        let entities = EntitiesRepo::new(rt.db.clone());
        let relations = RelationsRepo::new(rt.db.clone());
        let jobs = JobsRepo::new(rt.db.clone());
        Self { rt, entities, relations, jobs, job_id }
    }

    /// Records a pre-pass or post-hoc total for one of the progress counters
    /// (`messages`, `reactions`, `attachments`, `emojis`, `json_files`) under
    /// `<name>_total` in `job.meta`, alongside the `<name>_processed` running
    /// counts `bump_counter` maintains.
    pub async fn set_total(&self, name: &str, value: i64) -> Result<(), sea_orm::DbErr> {
        self.jobs.merge_meta(self.job_id, json!({ format!("{name}_total"): value })).await
    }
}

/// Runs the full extract -> users -> channels -> messages -> emojis ->
/// reactions -> attachments pipeline against a freshly created job, updating
/// `current_stage` before each step and `status` on completion or failure.
/// The temp extraction directory is always removed on exit, success or not.
pub async fn run_import(rt: Runtime, job_id: i64, zip_path: PathBuf) -> Result<(), ImportError> {
    let ctx = PipelineCtx::new(rt, job_id);
    match run_stages(&ctx, &zip_path).await {
        Ok(()) => {
            // Leaves the job in `running/exporting`: the export orchestrator
            // (triggered via `/export` or startup resume) is what advances it
            // to `done/success` once the barrier batch finishes (spec 4.5).
            info!(job_id, "import completed, ready for export");
            Ok(())
        }
        Err(e) => {
            error!(job_id, error = %e, "import failed");
            ctx.jobs.set_status(job_id, JobStatus::Failed, Some(&e.to_string())).await?;
            Err(e)
        }
    }
}

async fn run_stages(ctx: &PipelineCtx, zip_path: &Path) -> Result<(), ImportError> {
    ctx.jobs.set_stage(ctx.job_id, stage::EXTRACTING).await?;
    let extract_dir = std::env::temp_dir().join(format!("mm-importer-job-{}", ctx.job_id));
    extract_zip(zip_path, &extract_dir)?;

    let json_files_total = count_json_files(&extract_dir)?;
    ctx.set_total("json_files", json_files_total as i64).await?;
    ctx.jobs
        .merge_meta(ctx.job_id, json!({ "extract_dir": extract_dir.to_string_lossy() }))
        .await?;

    let result = run_inner_stages(ctx, &extract_dir).await;

    let _ = std::fs::remove_dir_all(&extract_dir);
    ctx.jobs.remove_meta_key(ctx.job_id, "extract_dir").await?;

    result
}

async fn run_inner_stages(ctx: &PipelineCtx, extract_dir: &Path) -> Result<(), ImportError> {
    ctx.jobs.set_stage(ctx.job_id, stage::USERS).await?;
    import_users(ctx, extract_dir).await?;
    ctx.jobs.bump_counter(ctx.job_id, "json_files_processed", 1).await?;

    ctx.jobs.set_stage(ctx.job_id, stage::CHANNELS).await?;
    let dir_to_slack_id = import_channels(ctx, extract_dir).await?;
    ctx.jobs.bump_counter(ctx.job_id, "json_files_processed", 1).await?;

    ctx.jobs.set_stage(ctx.job_id, stage::MESSAGES).await?;
    let totals = precompute_totals(extract_dir, &dir_to_slack_id).await?;
    ctx.set_total("messages", totals.messages as i64).await?;
    ctx.set_total("reactions", totals.reactions as i64).await?;
    ctx.set_total("attachments", totals.attachments as i64).await?;
    import_messages(ctx, extract_dir, &dir_to_slack_id).await?;

    ctx.jobs.set_stage(ctx.job_id, stage::EMOJIS).await?;
    import_emojis(ctx).await?;

    ctx.jobs.set_stage(ctx.job_id, stage::REACTIONS).await?;
    import_reactions(ctx).await?;

    ctx.jobs.set_stage(ctx.job_id, stage::ATTACHMENTS).await?;
    import_attachments(ctx).await?;

    ctx.jobs.set_stage(ctx.job_id, stage::EXPORTING).await?;
    Ok(())
}
