use sea_orm::{ColumnTrait, Condition};

use crate::models::entity::Column as EntityColumn;

/// Scopes a base condition by job_id the way the store's invariants require:
/// global types (user/channel/custom_emoji) ignore job_id entirely, job-scoped
/// types (message/reaction/attachment) are pinned to a specific job when one
/// is given and to `job_id IS NULL` otherwise.
pub fn job_scoped_condition(base: Condition, is_global: bool, job_id: Option<i64>) -> Condition {
    if is_global {
        return base;
    }
    match job_id {
        Some(id) => base.add(EntityColumn::JobId.eq(id)),
        None => base.add(EntityColumn::JobId.is_null()),
    }
}
