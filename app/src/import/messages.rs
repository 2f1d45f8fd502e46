use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::entity_kind::EntityKind;
use crate::models::relation_type::relation;
use crate::models::status_enum::MappingStatus;

use super::error::ImportError;
use super::json_array_stream::JsonArrayReader;
use super::pipeline::PipelineCtx;

#[derive(Debug, Default, Clone, Copy)]
pub struct MessageTotals {
    pub messages: u64,
    pub reactions: u64,
    pub attachments: u64,
}

fn day_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

/// The channel-day files belonging to already-known channels, in a
/// deterministic (channel name, then filename) order.
fn known_channel_day_files(
    extract_dir: &Path,
    dir_to_slack_id: &HashMap<String, String>,
) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    let mut dir_names: Vec<&String> = dir_to_slack_id.keys().collect();
    dir_names.sort();
    for dir_name in dir_names {
        let dir_path = extract_dir.join(dir_name);
        if !dir_path.is_dir() {
            continue;
        }
        let slack_id = dir_to_slack_id[dir_name].clone();
        for file in day_files(&dir_path)? {
            out.push((slack_id.clone(), file));
        }
    }
    Ok(out)
}

fn is_slack_file_url(url: &str) -> bool {
    url.contains("files.slack.com") || url.contains(".slack-edge.com") || url.contains("slack-files")
}

fn count_message(totals: &mut MessageTotals, msg: &Value) {
    totals.messages += 1;
    if let Some(reactions) = msg.get("reactions").and_then(Value::as_array) {
        for r in reactions {
            let user_count = r.get("users").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
            totals.reactions += user_count as u64;
        }
    }
    if let Some(files) = msg.get("files").and_then(Value::as_array) {
        for f in files {
            if f.get("url_private").and_then(Value::as_str).is_some_and(is_slack_file_url) {
                totals.attachments += 1;
            }
        }
    }
}

/// Pre-pass: streams every known channel's day files once, purely to compute
/// the `{messages, reactions, attachments}` totals the progress endpoints
/// report against before any row is written.
pub async fn precompute_totals(
    extract_dir: &Path,
    dir_to_slack_id: &HashMap<String, String>,
) -> Result<MessageTotals, ImportError> {
    let mut totals = MessageTotals::default();
    for (_, path) in known_channel_day_files(extract_dir, dir_to_slack_id)? {
        let file = File::open(&path)?;
        let mut reader = JsonArrayReader::new(BufReader::new(file));
        while let Some(msg) = reader.next_value()? {
            count_message(&mut totals, &msg);
        }
    }
    Ok(totals)
}

async fn ensure_synthetic_bot_user(ctx: &PipelineCtx, user_id: &str) -> Result<(), ImportError> {
    if ctx.entities.find_one(EntityKind::User, user_id, None).await?.is_some() {
        return Ok(());
    }
    let raw = serde_json::json!({
        "id": user_id,
        "is_bot": true,
        "profile": { "real_name": user_id, "display_name": user_id },
    });
    ctx.entities
        .upsert_entity(EntityKind::User, user_id, None, raw, MappingStatus::Pending)
        .await?;
    Ok(())
}

fn is_bot_author(user_id: &str) -> bool {
    user_id.starts_with('B') || user_id == "USLACKBOT"
}

/// Streams every known channel's day files and upserts one job-scoped
/// `message` entity per object carrying a `ts`, plus `posted_in`,
/// `posted_by`, and (when applicable) `thread_reply` relations.
pub async fn import_messages(
    ctx: &PipelineCtx,
    extract_dir: &Path,
    dir_to_slack_id: &HashMap<String, String>,
) -> Result<usize, ImportError> {
    let mut count = 0usize;

    for (channel_slack_id, path) in known_channel_day_files(extract_dir, dir_to_slack_id)? {
        let Some(channel_entity) = ctx
            .entities
            .find_one(EntityKind::Channel, &channel_slack_id, None)
            .await?
        else {
            warn!(channel = %channel_slack_id, "channel vanished mid-import, skipping day file");
            continue;
        };

        let file = File::open(&path)?;
        let mut reader = JsonArrayReader::new(BufReader::new(file));
        while let Some(mut msg) = reader.next_value()? {
            let Some(ts) = msg.get("ts").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };

            if let Some(obj) = msg.as_object_mut() {
                obj.insert("channel_id".to_string(), Value::String(channel_slack_id.clone()));
            }

            let (message_entity, _) = ctx
                .entities
                .upsert_entity(EntityKind::Message, &ts, Some(ctx.job_id), msg.clone(), MappingStatus::Pending)
                .await?;

            ctx.relations
                .insert_if_absent(
                    message_entity.id,
                    channel_entity.id,
                    relation::POSTED_IN,
                    Some(ctx.job_id),
                    None,
                )
                .await?;

            let author = msg
                .get("user")
                .and_then(Value::as_str)
                .or_else(|| msg.get("bot_id").and_then(Value::as_str));

            if let Some(author_id) = author {
                if is_bot_author(author_id) {
                    ensure_synthetic_bot_user(ctx, author_id).await?;
                }
                if let Some(user_entity) = ctx.entities.find_one(EntityKind::User, author_id, None).await? {
                    ctx.relations
                        .insert_if_absent(
                            user_entity.id,
                            message_entity.id,
                            relation::POSTED_BY,
                            Some(ctx.job_id),
                            None,
                        )
                        .await?;
                } else {
                    debug!(ts = %ts, author = %author_id, "posted_by skipped: author not a known user");
                }
            }

            if let Some(thread_ts) = msg.get("thread_ts").and_then(Value::as_str) {
                if thread_ts != ts {
                    if let Some(parent) = ctx
                        .entities
                        .find_one(EntityKind::Message, thread_ts, Some(ctx.job_id))
                        .await?
                    {
                        ctx.relations
                            .insert_if_absent(
                                message_entity.id,
                                parent.id,
                                relation::THREAD_REPLY,
                                Some(ctx.job_id),
                                None,
                            )
                            .await?;
                    } else {
                        debug!(ts = %ts, thread_ts = %thread_ts, "thread_reply skipped: parent not seen yet");
                    }
                }
            }

            count += 1;
            ctx.jobs.bump_counter(ctx.job_id, "messages_processed", 1).await?;
        }
    }

    info!(count, "imported messages");
    Ok(count)
}
