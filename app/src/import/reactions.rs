use serde_json::Value;
use tracing::info;

use crate::models::entity_kind::EntityKind;
use crate::models::relation_type::relation;
use crate::models::status_enum::MappingStatus;
use crate::utils::emoji::strip_skin_tone;

use super::error::ImportError;
use super::pipeline::PipelineCtx;

/// Explodes each message's `reactions` array into one job-scoped `reaction`
/// entity per (emoji, user) pair, keyed by `"<ts>_<name>_<user>"` so re-runs
/// upsert in place rather than duplicating. Creates `reacted_by(user ->
/// reaction)`, `reacted_to(reaction -> message)`, and — when the shortcode
/// resolves to a custom emoji already imported — `custom_emoji_used(reaction
/// -> custom_emoji)`.
pub async fn import_reactions(ctx: &PipelineCtx) -> Result<usize, ImportError> {
    let messages = ctx.entities.all_for_job(EntityKind::Message, ctx.job_id).await?;

    let mut count = 0usize;
    for message in &messages {
        let Some(ts) = message.raw_data.get("ts").and_then(Value::as_str) else {
            continue;
        };
        let Some(reactions) = message.raw_data.get("reactions").and_then(Value::as_array) else {
            continue;
        };

        for reaction in reactions {
            let Some(name) = reaction.get("name").and_then(Value::as_str) else {
                continue;
            };
            let Some(users) = reaction.get("users").and_then(Value::as_array) else {
                continue;
            };

            let custom_emoji = ctx
                .entities
                .find_one(EntityKind::CustomEmoji, strip_skin_tone(name), None)
                .await?;

            for user_id in users.iter().filter_map(Value::as_str) {
                let composite_id = format!("{ts}_{name}_{user_id}");
                let raw = serde_json::json!({
                    "message_ts": ts,
                    "emoji_name": name,
                    "user": user_id,
                    "composite_id": composite_id,
                });

                let (reaction_entity, _) = ctx
                    .entities
                    .upsert_entity(
                        EntityKind::Reaction,
                        &composite_id,
                        Some(ctx.job_id),
                        raw,
                        MappingStatus::Pending,
                    )
                    .await?;

                ctx.relations
                    .insert_if_absent(
                        reaction_entity.id,
                        message.id,
                        relation::REACTED_TO,
                        Some(ctx.job_id),
                        None,
                    )
                    .await?;

                if let Some(user_entity) = ctx.entities.find_one(EntityKind::User, user_id, None).await? {
                    ctx.relations
                        .insert_if_absent(
                            user_entity.id,
                            reaction_entity.id,
                            relation::REACTED_BY,
                            Some(ctx.job_id),
                            None,
                        )
                        .await?;
                }

                if let Some(emoji_entity) = &custom_emoji {
                    ctx.relations
                        .insert_if_absent(
                            reaction_entity.id,
                            emoji_entity.id,
                            relation::CUSTOM_EMOJI_USED,
                            Some(ctx.job_id),
                            None,
                        )
                        .await?;
                }

                count += 1;
                ctx.jobs.bump_counter(ctx.job_id, "reactions_processed", 1).await?;
            }
        }
    }

    info!(count, "imported reactions");
    Ok(count)
}
