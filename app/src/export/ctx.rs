use crate::core::runtime::Runtime;
use crate::repos::entities::EntitiesRepo;
use crate::repos::jobs::JobsRepo;
use crate::repos::relations::RelationsRepo;

/// Collaborators threaded through every exporter call. Unlike
/// `import::PipelineCtx`, this is not scoped to a single job — global types
/// are exported across the whole batch, job-scoped types per job — so
/// exporters take the owning entity's `job_id` from the row itself.
#[derive(Clone)]
pub struct ExportCtx {
    pub rt: Runtime,
    pub entities: EntitiesRepo,
    pub relations: RelationsRepo,
    pub jobs: JobsRepo,
}

impl ExportCtx {
    pub fn new(rt: Runtime) -> Self {
        let entities = EntitiesRepo::new(rt.db.clone());
        let relations = RelationsRepo::new(rt.db.clone());
        let jobs = JobsRepo::new(rt.db.clone());
        Self { rt, entities, relations, jobs }
    }
}

/// What an exporter accomplished with one entity. The worker pool translates
/// this into the row's terminal `status`.
pub enum ExportOutcome {
    Success(String),
    Skipped(String),
}
