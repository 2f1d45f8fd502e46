use serde_json::{json, Value};

use crate::models::entity::Model as EntityModel;
use crate::models::entity_kind::EntityKind;
use crate::models::relation_type::relation;
use crate::utils::emoji::{reaction_alternates, transliterate_and_sanitize};

use super::super::cache::ExportCache;
use super::super::ctx::{ExportCtx, ExportOutcome};
use super::super::error::ExportError;
use super::PLUGIN_BASE;

async fn resolve_message(ctx: &ExportCtx, entity: &EntityModel) -> Result<Option<EntityModel>, ExportError> {
    if let Some(message) = ctx.relations.to_entity_via(entity.id, relation::REACTED_TO).await? {
        return Ok(Some(message));
    }
    let ts = entity
        .raw_data
        .get("message_ts")
        .and_then(Value::as_str)
        .or_else(|| entity.raw_data.get("item").and_then(|i| i.get("ts")).and_then(Value::as_str))
        .or_else(|| entity.raw_data.get("ts").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| entity.slack_id.split('_').next().unwrap_or(&entity.slack_id).to_string());
    Ok(ctx.entities.find_one(EntityKind::Message, &ts, None).await?)
}

async fn resolve_user(ctx: &ExportCtx, cache: &ExportCache, entity: &EntityModel) -> Result<Option<String>, ExportError> {
    if let Some(user) = ctx.relations.from_entity_via(entity.id, relation::REACTED_BY).await? {
        if let Some(id) = user.mattermost_id {
            return Ok(Some(id));
        }
    }
    let Some(slack_id) = entity.raw_data.get("user").and_then(Value::as_str) else {
        return Ok(None);
    };
    cache.user_mattermost_id(ctx, slack_id).await
}

fn is_not_found(body: &str) -> bool {
    body.contains("not_found") || body.contains("emoji not found") || body.contains("emoji_not_found")
}

fn is_duplicate(body: &str) -> bool {
    body.contains("already exists") || body.contains("duplicate") || body.contains("already_exists")
}

/// Posts one reaction to Mattermost, trying the emoji name and its known
/// alternates in order (covers Slack/Mattermost's `+1`/`thumbs_up` mismatch)
/// before giving up with `skipped`.
pub async fn export_reaction(
    ctx: &ExportCtx,
    cache: &ExportCache,
    entity: &EntityModel,
) -> Result<ExportOutcome, ExportError> {
    let Some(message) = resolve_message(ctx, entity).await? else {
        return Err(ExportError::MissingPrerequisite(format!(
            "reaction {} has no resolvable message",
            entity.slack_id
        )));
    };
    let Some(post_id) = message.mattermost_id else {
        return Err(ExportError::MissingPrerequisite(format!(
            "reaction {} target message has no mattermost_id yet",
            entity.slack_id
        )));
    };
    let Some(user_id) = resolve_user(ctx, cache, entity).await? else {
        return Err(ExportError::MissingPrerequisite(format!(
            "reaction {} has no resolvable mattermost user",
            entity.slack_id
        )));
    };

    if let Some(channel) = ctx.relations.to_entity_via(message.id, relation::POSTED_IN).await? {
        if let Some(channel_mm_id) = channel.mattermost_id {
            cache.ensure_member(ctx, &channel_mm_id, &user_id).await;
        }
    }

    let raw_name = entity.raw_data.get("emoji_name").and_then(Value::as_str).unwrap_or("");
    let mut candidates = reaction_alternates(raw_name);
    if let Some(first) = candidates.first() {
        if ctx.entities.find_one(EntityKind::CustomEmoji, first, None).await?.is_some() {
            candidates[0] = transliterate_and_sanitize(first);
        }
    }

    let create_at = message
        .raw_data
        .get("ts")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .map(|ts| (ts * 1000.0).floor() as i64)
        .unwrap_or(0);

    let mut last_error = None;
    for name in &candidates {
        let payload = json!({ "user_id": user_id, "post_id": post_id, "emoji_name": name, "create_at": create_at });
        match ctx.rt.mm.post_json(&format!("{PLUGIN_BASE}/reaction"), &payload).await {
            Ok(_) => return Ok(ExportOutcome::Success(format!("{post_id}:{name}"))),
            Err(crate::mm::client::MmApiError::Status { status, body })
                if status == reqwest::StatusCode::CONFLICT || is_duplicate(&body) =>
            {
                return Ok(ExportOutcome::Success(format!("{post_id}:{name}")))
            }
            Err(crate::mm::client::MmApiError::Status { body, .. }) if is_not_found(&body) => {
                last_error = Some(body);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(ExportOutcome::Skipped(format!(
        "no emoji candidate resolved for {}: {}",
        raw_name,
        last_error.unwrap_or_default()
    )))
}
