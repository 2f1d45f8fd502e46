use base64::Engine;
use serde_json::{json, Value};

use crate::models::entity::Model as EntityModel;
use crate::models::relation_type::relation;

use super::super::ctx::{ExportCtx, ExportOutcome};
use super::super::error::ExportError;
use super::channel::resolve_mattermost_channel_id;
use super::PLUGIN_BASE;

async fn resolve_channel_id(ctx: &ExportCtx, attachment: &EntityModel) -> Result<Option<String>, ExportError> {
    let Some(message) = ctx.relations.to_entity_via(attachment.id, relation::ATTACHED_TO).await? else {
        return Ok(None);
    };
    if let Some(channel) = ctx.relations.to_entity_via(message.id, relation::POSTED_IN).await? {
        if channel.mattermost_id.is_some() {
            return Ok(channel.mattermost_id);
        }
    }
    let Some(channel_slack_id) = message.raw_data.get("channel_id").and_then(Value::as_str) else {
        return Ok(None);
    };
    resolve_mattermost_channel_id(ctx, channel_slack_id).await
}

/// Re-hosts one Slack file attachment on Mattermost, skipping files over the
/// configured size ceiling without attempting a download.
pub async fn export_attachment(ctx: &ExportCtx, entity: &EntityModel) -> Result<ExportOutcome, ExportError> {
    if let Some(max_mb) = ctx.rt.config.attachment_max_mb {
        let size = entity.raw_data.get("size").and_then(Value::as_u64).unwrap_or(0);
        if size > max_mb * 1024 * 1024 {
            return Ok(ExportOutcome::Skipped(format!("{size} bytes exceeds {max_mb}MB limit")));
        }
    }

    let Some(channel_id) = resolve_channel_id(ctx, entity).await? else {
        return Err(ExportError::MissingPrerequisite(format!(
            "attachment {} has no resolvable mattermost channel",
            entity.slack_id
        )));
    };

    let Some(url) = entity.raw_data.get("url_private").and_then(Value::as_str) else {
        return Err(ExportError::MissingPrerequisite("attachment entity missing url_private".to_string()));
    };
    let filename = entity
        .raw_data
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&entity.slack_id)
        .to_string();

    let Some(slack) = ctx.rt.slack.as_ref() else {
        return Err(ExportError::MissingPrerequisite("no SLACK_BOT_TOKEN configured for attachment download".to_string()));
    };
    let bytes = slack.download(url).await?;

    let file_id = if ctx.rt.config.attachment_multipart {
        upload_multipart(ctx, &channel_id, &filename, bytes).await?
    } else {
        upload_base64(ctx, &channel_id, &filename, bytes).await?
    };

    Ok(ExportOutcome::Success(file_id))
}

async fn upload_multipart(
    ctx: &ExportCtx,
    channel_id: &str,
    filename: &str,
    bytes: bytes::Bytes,
) -> Result<String, ExportError> {
    let tmp_path = std::env::temp_dir().join(format!("mm-attachment-{}", uuid::Uuid::new_v4()));
    tokio::fs::write(&tmp_path, &bytes).await?;

    let result = ctx
        .rt
        .mm
        .post_multipart_file(
            &format!("{PLUGIN_BASE}/attachment_multipart"),
            &[("channel_id", channel_id.to_string()), ("filename", filename.to_string())],
            "file",
            &tmp_path,
            filename.to_string(),
        )
        .await;
    let _ = tokio::fs::remove_file(&tmp_path).await;

    let resp = result?;
    let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
    body.get("file_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExportError::MissingPrerequisite("attachment upload returned no file_id".to_string()))
}

async fn upload_base64(
    ctx: &ExportCtx,
    channel_id: &str,
    filename: &str,
    bytes: bytes::Bytes,
) -> Result<String, ExportError> {
    let content_base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let payload = json!({
        "channel_id": channel_id,
        "filename": filename,
        "content_base64": content_base64,
    });
    let resp = ctx.rt.mm.post_json(&format!("{PLUGIN_BASE}/attachment"), &payload).await?;
    let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
    body.get("file_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExportError::MissingPrerequisite("attachment upload returned no file_id".to_string()))
}
