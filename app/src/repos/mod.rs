pub mod entities;
pub mod jobs;
pub mod relations;

use sea_orm::{DbErr, RuntimeErr};

/// Postgres unique_violation (23505). Upserts race on this; the caller
/// re-selects rather than treating it as fatal.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let msg = match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            e.as_database_error().and_then(|d| d.code()).map(|c| c.into_owned())
        }
        _ => None,
    };
    msg.as_deref() == Some("23505")
}
