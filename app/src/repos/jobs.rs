use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};
use serde_json::{json, Value as Json};

use crate::models::import_job::{ActiveModel, Column, Entity, Model};
use crate::models::job_status_enum::JobStatus;

#[derive(Clone)]
pub struct JobsRepo {
    db: DatabaseConnection,
}

impl JobsRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self) -> Result<Model, DbErr> {
        let now = Utc::now().fixed_offset();
        let active = ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            status: Set(JobStatus::Running),
            current_stage: Set(crate::models::import_job::stage::EXTRACTING.to_string()),
            meta: Set(json!({})),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        active.insert(&self.db).await
    }

    pub async fn by_id(&self, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// All `running` jobs, oldest first, regardless of stage. Used by the
    /// startup supervisor to decide what to fail vs. resume.
    pub async fn all_running(&self) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::Status.eq(JobStatus::Running))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await
    }

    /// Jobs in FIFO order that have reached the export stage: the export
    /// orchestrator's scheduling unit for one barrier batch.
    pub async fn running_exporting(&self, anchor_job_id: Option<i64>) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find()
            .filter(Column::Status.eq(JobStatus::Running))
            .filter(Column::CurrentStage.eq(crate::models::import_job::stage::EXPORTING));
        if let Some(anchor) = anchor_job_id {
            query = query.filter(Column::Id.lte(anchor));
        }
        query
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await
    }

    /// The oldest `running` job regardless of stage, used to decide whether
    /// the export loop should keep polling or exit.
    pub async fn earliest_running(&self, anchor_job_id: Option<i64>) -> Result<Option<Model>, DbErr> {
        let mut query = Entity::find().filter(Column::Status.eq(JobStatus::Running));
        if let Some(anchor) = anchor_job_id {
            query = query.filter(Column::Id.lte(anchor));
        }
        query
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .one(&self.db)
            .await
    }

    pub async fn set_stage(&self, job_id: i64, stage: &str) -> Result<(), DbErr> {
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "UPDATE import_jobs SET current_stage = $1, updated_at = now() WHERE id = $2",
                [stage.into(), job_id.into()],
            ))
            .await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        job_id: i64,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), DbErr> {
        let status_str = match status {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        };
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "UPDATE import_jobs SET status = $1::job_status, error_message = $2, updated_at = now() WHERE id = $3",
                [status_str.into(), error.into(), job_id.into()],
            ))
            .await?;
        Ok(())
    }

    pub async fn mark_done(&self, job_id: i64) -> Result<(), DbErr> {
        self.set_stage(job_id, crate::models::import_job::stage::DONE).await?;
        self.set_status(job_id, JobStatus::Success, None).await
    }

    /// Shallow-merges `patch` into `meta` in a single statement. Used for
    /// totals and one-shot transient keys; never for concurrent counters
    /// (use `bump_counter` for those).
    pub async fn merge_meta(&self, job_id: i64, patch: Json) -> Result<(), DbErr> {
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "UPDATE import_jobs SET meta = meta || $1::jsonb, updated_at = now() WHERE id = $2",
                [patch.into(), job_id.into()],
            ))
            .await?;
        Ok(())
    }

    /// Removes a key from `meta` in a single statement (e.g. the transient
    /// `extract_dir` on cleanup).
    pub async fn remove_meta_key(&self, job_id: i64, key: &str) -> Result<(), DbErr> {
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "UPDATE import_jobs SET meta = meta - $1, updated_at = now() WHERE id = $2",
                [key.into(), job_id.into()],
            ))
            .await?;
        Ok(())
    }

    /// Atomic read-compute-write increment of `meta.<key>` by `delta`.
    /// Concurrency-safe: the increment happens inside the single UPDATE, not
    /// across two round-trips.
    pub async fn bump_counter(&self, job_id: i64, key: &str, delta: i64) -> Result<(), DbErr> {
        let path = format!("{{{key}}}");
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "UPDATE import_jobs SET meta = jsonb_set(meta, $1, to_jsonb(COALESCE((meta->>$2)::bigint, 0) + $3), true), updated_at = now() WHERE id = $4",
                [path.into(), key.into(), delta.into(), job_id.into()],
            ))
            .await?;
        Ok(())
    }
}
