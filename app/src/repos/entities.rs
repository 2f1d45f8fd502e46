use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use serde_json::Value as Json;

use crate::models::entity::{ActiveModel, Column, Entity, Model};
use crate::models::entity_kind::EntityKind;
use crate::models::status_enum::MappingStatus;
use crate::utils::filters::job_scoped_condition;

use super::is_unique_violation;

#[derive(Clone)]
pub struct EntitiesRepo {
    db: DatabaseConnection,
}

impl EntitiesRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn scope(&self, kind: EntityKind, slack_id: &str, job_id: Option<i64>) -> Condition {
        let base = Condition::all()
            .add(Column::EntityType.eq(kind.as_str()))
            .add(Column::SlackId.eq(slack_id));
        job_scoped_condition(base, kind.is_global(), job_id)
    }

    pub async fn find_one(
        &self,
        kind: EntityKind,
        slack_id: &str,
        job_id: Option<i64>,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(self.scope(kind, slack_id, job_id))
            .one(&self.db)
            .await
    }

    /// Insert-or-fetch under the store's scoping rule. Converges concurrent
    /// racers to a single row via the partial unique index: on conflict,
    /// re-select instead of treating the write as failed.
    pub async fn upsert_entity(
        &self,
        kind: EntityKind,
        slack_id: &str,
        job_id: Option<i64>,
        raw_data: Json,
        status: MappingStatus,
    ) -> Result<(Model, bool), DbErr> {
        if let Some(existing) = self.find_one(kind, slack_id, job_id).await? {
            return Ok((existing, false));
        }

        let scoped_job_id = if kind.is_global() { None } else { job_id };
        let now = Utc::now().fixed_offset();
        let active = ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            entity_type: Set(kind.as_str().to_string()),
            slack_id: Set(slack_id.to_string()),
            mattermost_id: Set(None),
            raw_data: Set(raw_data),
            status: Set(status),
            error_message: Set(None),
            job_id: Set(scoped_job_id),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match active.insert(&self.db).await {
            Ok(model) => Ok((model, true)),
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .find_one(kind, slack_id, job_id)
                    .await?
                    .ok_or(e)?;
                Ok((existing, false))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_status(
        &self,
        kind: EntityKind,
        slack_id: &str,
        job_id: Option<i64>,
        status: MappingStatus,
        error: Option<String>,
        mattermost_id: Option<String>,
    ) -> Result<(), DbErr> {
        if let Some(existing) = self.find_one(kind, slack_id, job_id).await? {
            let mut am: ActiveModel = existing.into();
            am.status = Set(status);
            am.error_message = Set(error);
            if let Some(mm_id) = mattermost_id {
                am.mattermost_id = Set(Some(mm_id));
            }
            am.updated_at = Set(Utc::now().fixed_offset());
            am.update(&self.db).await?;
        }
        Ok(())
    }

    pub async fn count_by_status(
        &self,
        job_id: Option<i64>,
    ) -> Result<Vec<(String, MappingStatus, i64)>, DbErr> {
        #[derive(sea_orm::FromQueryResult)]
        struct Row {
            entity_type: String,
            status: MappingStatus,
            count: i64,
        }

        let mut query = Entity::find()
            .select_only()
            .column(Column::EntityType)
            .column(Column::Status)
            .column_as(Column::Id.count(), "count")
            .group_by(Column::EntityType)
            .group_by(Column::Status);

        if let Some(id) = job_id {
            query = query.filter(Column::JobId.eq(id));
        }

        let rows: Vec<Row> = query.into_model::<Row>().all(&self.db).await?;
        Ok(rows.into_iter().map(|r| (r.entity_type, r.status, r.count)).collect())
    }

    pub async fn count_for_job(&self, job_id: i64, kind: EntityKind) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::JobId.eq(job_id))
            .filter(Column::EntityType.eq(kind.as_str()))
            .count(&self.db)
            .await
    }

    pub async fn count_non_pending_for_job(&self, job_id: i64, kind: EntityKind) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::JobId.eq(job_id))
            .filter(Column::EntityType.eq(kind.as_str()))
            .filter(Column::Status.ne(MappingStatus::Pending))
            .count(&self.db)
            .await
    }

    /// Pending rows of `kind` across the given job ids (global types pass a
    /// single `None`-job lookup instead).
    pub async fn pending_for_jobs(
        &self,
        kind: EntityKind,
        job_ids: &[i64],
    ) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find()
            .filter(Column::EntityType.eq(kind.as_str()))
            .filter(Column::Status.eq(MappingStatus::Pending));

        query = if kind.is_global() {
            query.filter(Column::JobId.is_null())
        } else {
            query.filter(Column::JobId.is_in(job_ids.iter().copied()))
        };

        query.all(&self.db).await
    }

    pub async fn by_id(&self, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(&self.db).await
    }

    /// Every row of `kind` scoped to `job_id`, any status. Used by the
    /// message-count pre-pass and the per-channel scheduler.
    pub async fn all_for_job(&self, kind: EntityKind, job_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::EntityType.eq(kind.as_str()))
            .filter(Column::JobId.eq(job_id))
            .all(&self.db)
            .await
    }

    /// Rows of `kind` scoped to `job_id` that have not yet reached `success`
    /// (the per-channel scheduler's intake: anything still worth exporting).
    pub async fn non_success_for_job(&self, kind: EntityKind, job_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::EntityType.eq(kind.as_str()))
            .filter(Column::JobId.eq(job_id))
            .filter(Column::Status.ne(MappingStatus::Success))
            .all(&self.db)
            .await
    }
}
