use sea_orm::entity::prelude::*;

use super::job_status_enum::JobStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "import_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub status: JobStatus,
    pub current_stage: String,
    pub meta: Json,
    pub error_message: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entity::Entity")]
    Entity,
}

impl Related<super::entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Import stages, in pipeline order. `current_stage` is stored as free text
/// but the pipeline only ever writes one of these.
pub mod stage {
    pub const EXTRACTING: &str = "extracting";
    pub const USERS: &str = "users";
    pub const CHANNELS: &str = "channels";
    pub const MESSAGES: &str = "messages";
    pub const EMOJIS: &str = "emojis";
    pub const REACTIONS: &str = "reactions";
    pub const ATTACHMENTS: &str = "attachments";
    pub const EXPORTING: &str = "exporting";
    pub const DONE: &str = "done";
}
