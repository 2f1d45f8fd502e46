use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};

use crate::models::entity::Model as EntityModel;
use crate::models::relation_type::relation;

use super::super::cache::ExportCache;
use super::super::ctx::{ExportCtx, ExportOutcome};
use super::super::error::ExportError;
use super::super::markdown::{convert_message_body, MarkdownCtx};
use super::PLUGIN_BASE;

async fn resolve_channel(
    ctx: &ExportCtx,
    cache: &ExportCache,
    entity: &EntityModel,
) -> Result<Option<String>, ExportError> {
    if let Some(channel) = ctx.relations.to_entity_via(entity.id, relation::POSTED_IN).await? {
        if channel.mattermost_id.is_some() {
            return Ok(channel.mattermost_id);
        }
    }
    let Some(channel_slack_id) = entity.raw_data.get("channel_id").and_then(Value::as_str) else {
        return Ok(None);
    };
    cache.channel_mattermost_id(ctx, channel_slack_id).await
}

async fn resolve_author(
    ctx: &ExportCtx,
    cache: &ExportCache,
    entity: &EntityModel,
) -> Result<String, ExportError> {
    if let Some(user) = ctx.relations.from_entity_via(entity.id, relation::POSTED_BY).await? {
        if let Some(id) = user.mattermost_id {
            return Ok(id);
        }
    }
    let author_slack_id = entity
        .raw_data
        .get("user")
        .and_then(Value::as_str)
        .or_else(|| entity.raw_data.get("bot_id").and_then(Value::as_str));
    if let Some(slack_id) = author_slack_id {
        if let Some(id) = cache.user_mattermost_id(ctx, slack_id).await? {
            return Ok(id);
        }
    }
    Ok(ctx.rt.bot_user_id().await?)
}

async fn resolve_root_id(ctx: &ExportCtx, entity: &EntityModel) -> Result<Option<String>, ExportError> {
    let Some(parent) = ctx.relations.to_entity_via(entity.id, relation::THREAD_REPLY).await? else {
        return Ok(None);
    };
    Ok(parent.mattermost_id)
}

async fn file_ids(ctx: &ExportCtx, entity: &EntityModel) -> Result<Vec<String>, ExportError> {
    let attachments = ctx.relations.from_entities_via(entity.id, relation::ATTACHED_TO).await?;
    Ok(attachments.into_iter().filter_map(|a| a.mattermost_id).collect())
}

/// Scans a message's whole raw payload (text, blocks, rich-text elements) for
/// `<@U…>`/`<#C…>` mention tokens so the markdown pass can resolve just the
/// handful of ids actually referenced, not the whole workspace.
fn scan_mentions(raw: &Value, user_ids: &mut HashSet<String>, channel_ids: &mut HashSet<String>) {
    match raw {
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let mut i = 0;
            while i < chars.len() {
                if chars[i] != '<' {
                    i += 1;
                    continue;
                }
                let Some(close) = chars[i..].iter().position(|&c| c == '>') else {
                    i += 1;
                    continue;
                };
                let token: String = chars[i + 1..i + close].iter().collect();
                let id_part = token.split('|').next().unwrap_or("");
                if let Some(id) = id_part.strip_prefix('@') {
                    user_ids.insert(id.to_string());
                } else if let Some(id) = id_part.strip_prefix('#') {
                    channel_ids.insert(id.to_string());
                }
                i += close + 1;
            }
        }
        Value::Array(items) => {
            for item in items {
                scan_mentions(item, user_ids, channel_ids);
            }
        }
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("user") {
                if let Some(id) = map.get("user_id").and_then(Value::as_str) {
                    user_ids.insert(id.to_string());
                }
            }
            if map.get("type").and_then(Value::as_str) == Some("channel") {
                if let Some(id) = map.get("channel_id").and_then(Value::as_str) {
                    channel_ids.insert(id.to_string());
                }
            }
            for v in map.values() {
                scan_mentions(v, user_ids, channel_ids);
            }
        }
        _ => {}
    }
}

async fn build_markdown_lookups(
    ctx: &ExportCtx,
    cache: &ExportCache,
    raw: &Value,
) -> Result<(HashMap<String, String>, HashMap<String, String>), ExportError> {
    let mut user_ids = HashSet::new();
    let mut channel_ids = HashSet::new();
    scan_mentions(raw, &mut user_ids, &mut channel_ids);

    let mut usernames = HashMap::new();
    for id in user_ids {
        usernames.insert(id.clone(), cache.username(ctx, &id).await?);
    }
    let mut channel_names = HashMap::new();
    for id in channel_ids {
        channel_names.insert(id.clone(), cache.channel_name(ctx, &id).await?);
    }
    Ok((usernames, channel_names))
}

fn create_at_millis(entity: &EntityModel) -> i64 {
    entity
        .raw_data
        .get("ts")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .map(|ts| (ts * 1000.0).floor() as i64)
        .unwrap_or(0)
}

/// Posts one Slack message to Mattermost via the import plugin, resolving
/// its channel, author, attached files, and thread parent first.
pub async fn export_message(
    ctx: &ExportCtx,
    cache: &ExportCache,
    entity: &EntityModel,
) -> Result<ExportOutcome, ExportError> {
    let Some(channel_id) = resolve_channel(ctx, cache, entity).await? else {
        return Err(ExportError::MissingPrerequisite(format!(
            "message {} has no resolvable mattermost channel",
            entity.slack_id
        )));
    };
    let user_id = resolve_author(ctx, cache, entity).await?;
    let files = file_ids(ctx, entity).await?;
    let root_id = resolve_root_id(ctx, entity).await?;

    let (usernames, channel_names) = build_markdown_lookups(ctx, cache, &entity.raw_data).await?;
    let md_ctx = MarkdownCtx { usernames: &usernames, channel_names: &channel_names };
    let body = convert_message_body(&entity.raw_data, &md_ctx, !files.is_empty());

    cache.ensure_member(ctx, &channel_id, &user_id).await;

    let mut payload = json!({
        "user_id": user_id,
        "channel_id": channel_id,
        "message": body,
        "create_at": create_at_millis(entity),
    });
    if let Some(root) = &root_id {
        payload["root_id"] = json!(root);
    }
    if !files.is_empty() {
        payload["file_ids"] = json!(files);
    }

    let resp = ctx.rt.mm.post_json(&format!("{PLUGIN_BASE}/import"), &payload).await?;
    let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
    let post_id = body
        .get("post_id")
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| ExportError::MissingPrerequisite("message import returned no post id".to_string()))?;

    Ok(ExportOutcome::Success(post_id.to_string()))
}
