pub mod entity;
pub mod entity_kind;
pub mod entity_relation;
pub mod import_job;
pub mod job_status_enum;
pub mod relation_type;
pub mod status_enum;
