use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{info, warn};

use crate::models::entity_kind::EntityKind;
use crate::models::status_enum::MappingStatus;

use super::error::ImportError;
use super::pipeline::PipelineCtx;

const MAX_ALIAS_DEPTH: usize = 10;

fn is_shortcode_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '+' || c == '-'
}

/// Scans a string for `:shortcode:` tokens, same rule Slack itself uses for
/// rendering inline emoji: a colon, a run of word/`+`/`-` characters, and a
/// closing colon, with nothing requiring whitespace around it.
fn scan_text(text: &str, out: &mut HashSet<String>) {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != ':' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut j = start;
        while j < chars.len() && is_shortcode_char(chars[j]) {
            j += 1;
        }
        if j < chars.len() && chars[j] == ':' && j > start {
            out.insert(chars[start..j].iter().collect());
            i = j + 1;
        } else {
            i += 1;
        }
    }
}

/// Recursively walks a message payload's `text`, `blocks`, and classic
/// `attachments`, collecting every `:shortcode:` token found in any string
/// value. Blind to structure beyond "is it a string" so it naturally covers
/// rich_text elements, section mrkdwn, attachment fallback text, and so on.
fn collect_shortcodes(value: &Value, out: &mut HashSet<String>) {
    match value {
        Value::String(s) => scan_text(s, out),
        Value::Array(items) => {
            for item in items {
                collect_shortcodes(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_shortcodes(v, out);
            }
        }
        _ => {}
    }
}

/// Follows an `alias:other_name` chain to a concrete image URL. Terminates at
/// `MAX_ALIAS_DEPTH` hops or the first repeated name (cycle), returning
/// `None` either way since the shortcode doesn't resolve to anything usable.
fn resolve_emoji_url(name: &str, emoji_map: &HashMap<String, String>) -> Option<String> {
    let mut current = name.to_string();
    let mut visited = HashSet::new();
    for _ in 0..MAX_ALIAS_DEPTH {
        if !visited.insert(current.clone()) {
            return None;
        }
        let Some(value) = emoji_map.get(&current) else {
            return None;
        };
        match value.strip_prefix("alias:") {
            Some(target) => current = target.to_string(),
            None => return Some(value.clone()),
        }
    }
    None
}

/// Scans every job-scoped message's text/blocks/attachments for emoji
/// shortcodes and creates a global `custom_emoji` entity for each unique one
/// that resolves to a concrete URL against the Slack workspace's emoji list.
pub async fn import_emojis(ctx: &PipelineCtx) -> Result<usize, ImportError> {
    let Some(slack) = ctx.rt.slack.as_ref() else {
        warn!("no SLACK_BOT_TOKEN configured, skipping custom emoji resolution");
        return Ok(0);
    };

    let emoji_map = slack
        .emoji_list()
        .await
        .map_err(|e| ImportError::Other(format!("emoji.list failed: {e}")))?;

    let messages = ctx.entities.all_for_job(EntityKind::Message, ctx.job_id).await?;
    let mut shortcodes = HashSet::new();
    for message in &messages {
        collect_shortcodes(&message.raw_data, &mut shortcodes);
    }

    let mut created = 0usize;
    for shortcode in &shortcodes {
        let Some(url) = resolve_emoji_url(shortcode, &emoji_map) else {
            continue;
        };
        let raw = serde_json::json!({ "name": shortcode, "url": url });
        ctx.entities
            .upsert_entity(EntityKind::CustomEmoji, shortcode, None, raw, MappingStatus::Pending)
            .await?;
        created += 1;
        ctx.jobs.bump_counter(ctx.job_id, "emojis_processed", 1).await?;
    }

    ctx.set_total("emojis", created as i64).await?;
    info!(count = created, scanned = shortcodes.len(), "resolved custom emoji");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_shortcode_in_text() {
        let mut out = HashSet::new();
        scan_text("nice one :thumbsup: and :tada:!", &mut out);
        assert_eq!(out, HashSet::from(["thumbsup".to_string(), "tada".to_string()]));
    }

    #[test]
    fn ignores_bare_colons() {
        let mut out = HashSet::new();
        scan_text("time is 10:30, not an emoji", &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn resolves_alias_chain() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "alias:b".to_string());
        map.insert("b".to_string(), "alias:c".to_string());
        map.insert("c".to_string(), "https://example.com/c.png".to_string());
        assert_eq!(resolve_emoji_url("a", &map), Some("https://example.com/c.png".to_string()));
    }

    #[test]
    fn cycle_returns_none() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "alias:b".to_string());
        map.insert("b".to_string(), "alias:a".to_string());
        assert_eq!(resolve_emoji_url("a", &map), None);
    }

    #[test]
    fn unresolved_returns_none() {
        let map = HashMap::new();
        assert_eq!(resolve_emoji_url("missing", &map), None);
    }
}
