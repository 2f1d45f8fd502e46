use serde_json::Value;

use crate::models::entity::Model as EntityModel;
use crate::utils::emoji::transliterate_and_sanitize;

use super::super::ctx::{ExportCtx, ExportOutcome};
use super::super::error::ExportError;

/// Creates a Mattermost custom emoji from a resolved Slack shortcode,
/// transliterating non-ASCII shortcodes first since Mattermost rejects
/// emoji names outside `[A-Za-z0-9_]+`.
pub async fn export_custom_emoji(ctx: &ExportCtx, entity: &EntityModel) -> Result<ExportOutcome, ExportError> {
    let name = transliterate_and_sanitize(&entity.slack_id);
    if name.is_empty() {
        return Ok(ExportOutcome::Skipped(format!("shortcode {} sanitizes to empty", entity.slack_id)));
    }

    let Some(url) = entity.raw_data.get("url").and_then(Value::as_str) else {
        return Ok(ExportOutcome::Skipped("no source url on custom_emoji entity".to_string()));
    };

    let bytes = ctx.rt.mm.download(url, None).await?;
    let creator_id = ctx.rt.bot_user_id().await?;
    let emoji_json = serde_json::to_string(&serde_json::json!({ "name": name, "creator_id": creator_id }))
        .expect("emoji metadata always serializes");

    match ctx
        .rt
        .mm
        .post_multipart_bytes(
            "/api/v4/emoji",
            &[("emoji", emoji_json)],
            "image",
            format!("{name}.png"),
            bytes,
        )
        .await
    {
        Ok(resp) => {
            let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
            let id = body
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| ExportError::MissingPrerequisite("emoji creation returned no id".to_string()))?;
            Ok(ExportOutcome::Success(id.to_string()))
        }
        Err(crate::mm::client::MmApiError::Status { body, .. }) if is_duplicate(&body) => {
            let resp = ctx.rt.mm.get(&format!("/api/v4/emoji/name/{name}")).await?;
            let existing: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
            let id = existing
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| ExportError::MissingPrerequisite("duplicate emoji lookup returned no id".to_string()))?;
            Ok(ExportOutcome::Success(id.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn is_duplicate(body: &str) -> bool {
    body.contains("already_exists") || body.contains("duplicate")
}
