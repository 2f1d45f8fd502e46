use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::models::entity_kind::EntityKind;
use crate::models::status_enum::MappingStatus;

use super::error::ImportError;
use super::pipeline::PipelineCtx;

/// Parses `users.json` and upserts one global `user` entity per element,
/// keyed by Slack's `id`. Small enough to load in one shot — the streaming
/// requirement in the spec is scoped to per-channel message files.
pub async fn import_users(ctx: &PipelineCtx, extract_dir: &Path) -> Result<usize, ImportError> {
    let path = extract_dir.join("users.json");
    if !path.is_file() {
        return Ok(0);
    }
    let file = File::open(&path)?;
    let users: Vec<Value> = serde_json::from_reader(BufReader::new(file))?;

    let mut count = 0;
    for user in users {
        let Some(slack_id) = user.get("id").and_then(Value::as_str) else {
            continue;
        };
        ctx.entities
            .upsert_entity(EntityKind::User, slack_id, None, user, MappingStatus::Pending)
            .await?;
        count += 1;
    }
    info!(count, "imported users");
    Ok(count)
}
