use serde_json::Value;
use tracing::info;

use crate::models::entity_kind::EntityKind;
use crate::models::relation_type::relation;
use crate::models::status_enum::MappingStatus;

use super::error::ImportError;
use super::pipeline::PipelineCtx;

fn is_slack_file_url(url: &str) -> bool {
    url.contains("files.slack.com") || url.contains(".slack-edge.com") || url.contains("slack-files")
}

/// Walks every job-scoped message's `files` array and creates one job-scoped
/// `attachment` entity per file hosted on Slack's own file store, plus an
/// `attached_to(attachment -> message)` relation. Files already hosted
/// elsewhere (e.g. a pasted external link) are not Slack's to re-host and are
/// left out of the export.
pub async fn import_attachments(ctx: &PipelineCtx) -> Result<usize, ImportError> {
    let messages = ctx.entities.all_for_job(EntityKind::Message, ctx.job_id).await?;

    let mut count = 0usize;
    for message in &messages {
        let Some(files) = message.raw_data.get("files").and_then(Value::as_array) else {
            continue;
        };

        for file in files {
            let Some(url) = file.get("url_private").and_then(Value::as_str) else {
                continue;
            };
            if !is_slack_file_url(url) {
                continue;
            }
            let Some(file_id) = file.get("id").and_then(Value::as_str) else {
                continue;
            };

            let (attachment_entity, _) = ctx
                .entities
                .upsert_entity(
                    EntityKind::Attachment,
                    file_id,
                    Some(ctx.job_id),
                    file.clone(),
                    MappingStatus::Pending,
                )
                .await?;

            ctx.relations
                .insert_if_absent(
                    attachment_entity.id,
                    message.id,
                    relation::ATTACHED_TO,
                    Some(ctx.job_id),
                    None,
                )
                .await?;

            count += 1;
            ctx.jobs.bump_counter(ctx.job_id, "attachments_processed", 1).await?;
        }
    }

    info!(count, "imported attachments");
    Ok(count)
}
