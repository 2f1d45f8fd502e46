use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::models::entity_kind::EntityKind;
use crate::models::relation_type::relation;
use crate::models::status_enum::MappingStatus;

use super::error::ImportError;
use super::pipeline::PipelineCtx;

const CHANNEL_FILES: [&str; 4] = ["channels.json", "groups.json", "dms.json", "mpims.json"];

/// Parses the four possible channel-listing files and upserts one global
/// `channel` entity per element, plus a `member_of(user -> channel)` relation
/// for every listed member that is already a known user.
///
/// Returns a directory-name -> slack_id map: Slack's export names each
/// channel's message directory after `name` (DMs/MPIMs fall back to `id`
/// since they have no `name`), which the messages stage needs to locate the
/// right channel entity for a given directory.
pub async fn import_channels(
    ctx: &PipelineCtx,
    extract_dir: &Path,
) -> Result<HashMap<String, String>, ImportError> {
    let mut dir_to_slack_id = HashMap::new();
    let mut total = 0usize;

    for filename in CHANNEL_FILES {
        let path = extract_dir.join(filename);
        if !path.is_file() {
            continue;
        }
        let file = File::open(&path)?;
        let channels: Vec<Value> = serde_json::from_reader(BufReader::new(file))?;

        for channel in channels {
            let Some(slack_id) = channel.get("id").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };

            let dir_name = channel
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .unwrap_or(&slack_id)
                .to_string();
            dir_to_slack_id.insert(dir_name, slack_id.clone());

            let members: Vec<String> = channel
                .get("members")
                .and_then(Value::as_array)
                .map(|m| {
                    let mut seen = HashSet::new();
                    m.iter()
                        .filter_map(Value::as_str)
                        .filter(|id| seen.insert(id.to_string()))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let (channel_entity, _) = ctx
                .entities
                .upsert_entity(EntityKind::Channel, &slack_id, None, channel, MappingStatus::Pending)
                .await?;

            for member_slack_id in &members {
                let Some(user_entity) = ctx
                    .entities
                    .find_one(EntityKind::User, member_slack_id, None)
                    .await?
                else {
                    warn!(channel = %slack_id, user = %member_slack_id, "skipping member_of: user not yet known");
                    continue;
                };
                ctx.relations
                    .insert_if_absent(user_entity.id, channel_entity.id, relation::MEMBER_OF, None, None)
                    .await?;
            }

            total += 1;
        }
    }

    info!(count = total, "imported channels");
    Ok(dir_to_slack_id)
}
