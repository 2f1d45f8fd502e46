use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "entity_relations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub from_entity_id: i64,
    pub to_entity_id: i64,
    pub relation_type: String,
    pub job_id: Option<i64>,
    pub raw_data: Option<Json>,
    pub created_at: DateTimeWithTimeZone,
}

// Two belongs_to edges into `entities` (from/to) can't both be expressed as
// the single canonical `Related<Entity>` sea-orm wants, so relation traversal
// for this table goes through explicit joins in repos::relations rather than
// `Related`.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::import_job::Entity",
        from = "Column::JobId",
        to = "super::import_job::Column::Id",
        on_delete = "Cascade"
    )]
    ImportJob,
}

impl ActiveModelBehavior for ActiveModel {}
