use sea_orm_migration::{
    prelude::{extension::postgres::Type, *},
    schema::*,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(MappingStatus::Type)
                    .values([
                        MappingStatus::Pending,
                        MappingStatus::Skipped,
                        MappingStatus::Failed,
                        MappingStatus::Success,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(JobStatus::Type)
                    .values([
                        JobStatus::Queued,
                        JobStatus::Running,
                        JobStatus::Success,
                        JobStatus::Failed,
                        JobStatus::Canceled,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table("import_jobs")
                    .if_not_exists()
                    .col(pk_auto("id"))
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .custom(JobStatus::Type)
                            .not_null()
                            .default("queued"),
                    )
                    .col(string("current_stage").not_null().default("extracting"))
                    .col(
                        ColumnDef::new(Alias::new("meta"))
                            .json()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(Alias::new("error_message")).text().null())
                    .col(
                        timestamp_with_time_zone("created_at")
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone("updated_at")
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table("entities")
                    .if_not_exists()
                    .col(pk_auto("id"))
                    .col(string("entity_type").not_null())
                    .col(string("slack_id").not_null())
                    .col(ColumnDef::new(Alias::new("mattermost_id")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("raw_data"))
                            .json()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .custom(MappingStatus::Type)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Alias::new("error_message")).text().null())
                    .col(ColumnDef::new(Alias::new("job_id")).big_integer().null())
                    .col(
                        timestamp_with_time_zone("created_at")
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone("updated_at")
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_entities_job")
                            .from("entities", "job_id")
                            .to("import_jobs", "id")
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX ux_entities_type_slackid_job ON entities (entity_type, slack_id, job_id) WHERE job_id IS NOT NULL",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX ux_entities_type_slackid_global ON entities (entity_type, slack_id) WHERE job_id IS NULL",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX ix_entities_job_type_status ON entities (job_id, entity_type, status)",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table("entity_relations")
                    .if_not_exists()
                    .col(pk_auto("id"))
                    .col(big_integer("from_entity_id").not_null())
                    .col(big_integer("to_entity_id").not_null())
                    .col(string("relation_type").not_null())
                    .col(ColumnDef::new(Alias::new("job_id")).big_integer().null())
                    .col(ColumnDef::new(Alias::new("raw_data")).json().null())
                    .col(
                        timestamp_with_time_zone("created_at")
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relations_from")
                            .from("entity_relations", "from_entity_id")
                            .to("entities", "id")
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relations_to")
                            .from("entity_relations", "to_entity_id")
                            .to("entities", "id")
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_relations_job")
                            .from("entity_relations", "job_id")
                            .to("import_jobs", "id")
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX ux_entity_relations_unique ON entity_relations (from_entity_id, to_entity_id, relation_type)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table("entity_relations").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table("entities").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table("import_jobs").to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(MappingStatus::Type).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(JobStatus::Type).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum MappingStatus {
    #[sea_orm(iden = "mapping_status")]
    Type,
    Pending,
    Skipped,
    Failed,
    Success,
}

#[derive(DeriveIden)]
pub enum JobStatus {
    #[sea_orm(iden = "job_status")]
    Type,
    Queued,
    Running,
    Success,
    Failed,
    Canceled,
}
