use serde_json::{json, Value};
use tracing::warn;

use crate::models::entity::Model as EntityModel;
use crate::models::entity_kind::EntityKind;
use crate::models::relation_type::relation;

use super::super::ctx::{ExportCtx, ExportOutcome};
use super::super::error::ExportError;
use super::PLUGIN_BASE;

fn strip_crlf(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

fn display_name(raw: &Value, slack_id: &str) -> String {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .unwrap_or(slack_id);
    let cleaned = strip_crlf(name);
    if cleaned.chars().count() > 64 {
        cleaned.chars().take(64).collect()
    } else {
        cleaned
    }
}

async fn member_mattermost_ids(ctx: &ExportCtx, channel: &EntityModel) -> Result<Vec<String>, ExportError> {
    let members = ctx.relations.from_entities_via(channel.id, relation::MEMBER_OF).await?;
    let mut ids = Vec::new();
    for member in members {
        match member.mattermost_id {
            Some(id) => ids.push(id),
            None => warn!(channel = %channel.slack_id, user = %member.slack_id, "member has no mattermost id yet"),
        }
    }
    Ok(ids)
}

/// Creates the Mattermost counterpart of one Slack channel: a direct
/// message, group direct message, or public/private channel, classified from
/// `slack_id`'s prefix and the `is_mpim`/`name` fields.
pub async fn export_channel(ctx: &ExportCtx, entity: &EntityModel) -> Result<ExportOutcome, ExportError> {
    let is_mpim = entity.raw_data.get("is_mpim").and_then(Value::as_bool).unwrap_or(false)
        || entity
            .raw_data
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| n.starts_with("mpdm-"));

    if entity.slack_id.starts_with('D') {
        return export_dm(ctx, entity).await;
    }
    if is_mpim {
        return export_gdm(ctx, entity).await;
    }
    export_standard_channel(ctx, entity).await
}

async fn export_dm(ctx: &ExportCtx, entity: &EntityModel) -> Result<ExportOutcome, ExportError> {
    let ids = member_mattermost_ids(ctx, entity).await?;
    if ids.len() != 2 {
        return Err(ExportError::MissingPrerequisite(format!(
            "dm {} needs exactly 2 resolved members, found {}",
            entity.slack_id,
            ids.len()
        )));
    }
    let resp = ctx
        .rt
        .mm
        .post_json(&format!("{PLUGIN_BASE}/dm"), &json!({ "user_ids": ids }))
        .await?;
    let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
    let id = body
        .get("channel_id")
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| ExportError::MissingPrerequisite("dm creation returned no channel id".to_string()))?;
    Ok(ExportOutcome::Success(id.to_string()))
}

async fn export_gdm(ctx: &ExportCtx, entity: &EntityModel) -> Result<ExportOutcome, ExportError> {
    let ids = member_mattermost_ids(ctx, entity).await?;
    if ids.len() < 2 {
        return Err(ExportError::MissingPrerequisite(format!(
            "gdm {} needs at least 2 resolved members, found {}",
            entity.slack_id,
            ids.len()
        )));
    }
    let resp = ctx
        .rt
        .mm
        .post_json(&format!("{PLUGIN_BASE}/gdm"), &json!({ "user_ids": ids }))
        .await?;
    let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
    let id = body
        .get("channel_id")
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| ExportError::MissingPrerequisite("gdm creation returned no channel id".to_string()))?;
    Ok(ExportOutcome::Success(id.to_string()))
}

async fn export_standard_channel(ctx: &ExportCtx, entity: &EntityModel) -> Result<ExportOutcome, ExportError> {
    let team_id = ctx.rt.team_id().await;
    let channel_type = if entity.slack_id.starts_with('G') { "P" } else { "O" };
    let name = entity
        .raw_data
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&entity.slack_id);
    let display = display_name(&entity.raw_data, &entity.slack_id);
    let purpose = entity
        .raw_data
        .get("purpose")
        .and_then(|p| p.get("value"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let header = entity
        .raw_data
        .get("topic")
        .and_then(|t| t.get("value"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let payload = json!({
        "team_id": team_id,
        "name": name,
        "display_name": display,
        "type": channel_type,
        "purpose": purpose,
        "header": header,
    });

    let resp = ctx.rt.mm.post_json(&format!("{PLUGIN_BASE}/channel"), &payload).await?;
    let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
    let channel_id = body
        .get("channel_id")
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| ExportError::MissingPrerequisite("channel creation returned no id".to_string()))?
        .to_string();

    let member_ids = member_mattermost_ids(ctx, entity).await?;
    for user_id in &member_ids {
        if let Err(e) = ctx
            .rt
            .mm
            .post_json(&format!("/api/v4/teams/{team_id}/members"), &json!({ "team_id": team_id, "user_id": user_id }))
            .await
        {
            warn!(user = %user_id, error = %e, "failed to ensure team membership, continuing");
        }
    }
    if !member_ids.is_empty() {
        ctx.rt
            .mm
            .post_json(
                &format!("{PLUGIN_BASE}/channel/members"),
                &json!({ "channel_id": channel_id, "user_ids": member_ids }),
            )
            .await?;
    }

    if entity.raw_data.get("is_archived").and_then(Value::as_bool).unwrap_or(false) {
        ctx.rt
            .mm
            .post_json(&format!("{PLUGIN_BASE}/channel/archive"), &json!({ "channel_id": channel_id }))
            .await?;
    }

    Ok(ExportOutcome::Success(channel_id))
}

/// Used by downstream exporters (message/attachment) to map a Slack channel
/// id to the Mattermost channel id via the `channel` entity's own record.
pub async fn resolve_mattermost_channel_id(
    ctx: &ExportCtx,
    channel_slack_id: &str,
) -> Result<Option<String>, ExportError> {
    Ok(ctx
        .entities
        .find_one(EntityKind::Channel, channel_slack_id, None)
        .await?
        .and_then(|c| c.mattermost_id))
}
