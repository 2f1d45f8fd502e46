use tracing::{error, info, warn};

use crate::core::runtime::Runtime;
use crate::export::orchestrate_export;
use crate::models::import_job::stage;
use crate::models::job_status_enum::JobStatus;
use crate::repos::jobs::JobsRepo;

const IMPORT_STAGES: [&str; 7] = [
    stage::EXTRACTING,
    stage::USERS,
    stage::CHANNELS,
    stage::MESSAGES,
    stage::EMOJIS,
    stage::REACTIONS,
    stage::ATTACHMENTS,
];

/// Runs once at process startup. Jobs stuck mid-import (stream parsing is not
/// safely resumable) are failed with an explanatory error; jobs already past
/// import and sitting in `exporting` are safe to resume since the export
/// side is itself idempotent, so the orchestrator is re-invoked for them.
pub async fn resume_on_startup(rt: &Runtime) -> anyhow::Result<()> {
    let jobs = JobsRepo::new(rt.db.clone());
    let running = jobs.all_running().await?;

    let mut any_exporting = false;
    for job in running {
        if IMPORT_STAGES.contains(&job.current_stage.as_str()) {
            warn!(job_id = job.id, stage = %job.current_stage, "failing job stuck mid-import after restart");
            jobs.set_status(
                job.id,
                JobStatus::Failed,
                Some("process restarted mid-import; stream parsing is not resumable"),
            )
            .await?;
        } else if job.current_stage == stage::EXPORTING {
            any_exporting = true;
        }
    }

    if any_exporting {
        info!("resuming export orchestrator for jobs left exporting across restart");
        orchestrate_export(rt.clone(), None).await?;
    }
    Ok(())
}
