use thiserror::Error;

use crate::mm::client::MmApiError;
use crate::mm::slack_client::SlackApiError;

/// Errors an exporter may raise. Exporters never let these escape to the
/// orchestrator as a hard stop — a worker catches them and marks the entity
/// `failed`, except `Skip` which marks `skipped`.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("mattermost api error: {0}")]
    Mm(#[from] MmApiError),
    #[error("slack api error: {0}")]
    Slack(#[from] SlackApiError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("skipped: {0}")]
    Skip(String),
}
