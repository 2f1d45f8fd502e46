use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};
use serde_json::Value as Json;

use crate::models::entity::{self, Entity as EntityTable};
use crate::models::entity_relation::{ActiveModel, Column, Entity, Model};

use super::is_unique_violation;

#[derive(Clone)]
pub struct RelationsRepo {
    db: DatabaseConnection,
}

impl RelationsRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Idempotent: swallows the unique-key conflict on (from, to, relation_type).
    pub async fn insert_if_absent(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
        job_id: Option<i64>,
        raw_data: Option<Json>,
    ) -> Result<(), DbErr> {
        let active = ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            from_entity_id: Set(from_id),
            to_entity_id: Set(to_id),
            relation_type: Set(relation_type.to_string()),
            job_id: Set(job_id),
            raw_data: Set(raw_data),
            created_at: Set(Utc::now().fixed_offset()),
        };
        match active.insert(&self.db).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// The single entity reached by following `from_id --relation_type-->`.
    pub async fn to_entity_via(
        &self,
        from_id: i64,
        relation_type: &str,
    ) -> Result<Option<entity::Model>, DbErr> {
        let Some(rel) = Entity::find()
            .filter(Column::FromEntityId.eq(from_id))
            .filter(Column::RelationType.eq(relation_type))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        EntityTable::find_by_id(rel.to_entity_id).one(&self.db).await
    }

    /// The single entity reaching `to_id` via `--relation_type-->`.
    pub async fn from_entity_via(
        &self,
        to_id: i64,
        relation_type: &str,
    ) -> Result<Option<entity::Model>, DbErr> {
        let Some(rel) = Entity::find()
            .filter(Column::ToEntityId.eq(to_id))
            .filter(Column::RelationType.eq(relation_type))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        EntityTable::find_by_id(rel.from_entity_id).one(&self.db).await
    }

    pub async fn all_of_type_for_job(
        &self,
        relation_type: &str,
        job_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::RelationType.eq(relation_type))
            .filter(Column::JobId.eq(job_id))
            .all(&self.db)
            .await
    }

    /// All entities reaching `to_id` via `--relation_type-->` (the one-to-many
    /// complement of `from_entity_via`, e.g. every attachment attached to a
    /// message, or every member of a channel).
    pub async fn from_entities_via(
        &self,
        to_id: i64,
        relation_type: &str,
    ) -> Result<Vec<entity::Model>, DbErr> {
        let rels = Entity::find()
            .filter(Column::ToEntityId.eq(to_id))
            .filter(Column::RelationType.eq(relation_type))
            .all(&self.db)
            .await?;
        if rels.is_empty() {
            return Ok(Vec::new());
        }
        let from_ids: Vec<i64> = rels.iter().map(|r| r.from_entity_id).collect();
        EntityTable::find()
            .filter(entity::Column::Id.is_in(from_ids))
            .all(&self.db)
            .await
    }
}
