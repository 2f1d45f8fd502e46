use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::models::entity_kind::EntityKind;

use super::ctx::ExportCtx;
use super::error::ExportError;
use super::exporters::PLUGIN_BASE;

/// Process-local lookup cache shared across one export run's channel tasks,
/// per spec 4.6: avoids re-querying the store or re-issuing membership calls
/// for the same (channel, user) pair from every concurrent channel task.
#[derive(Default)]
pub struct ExportCache {
    channel_mm_id: Mutex<HashMap<String, Option<String>>>,
    channel_name: Mutex<HashMap<String, String>>,
    user_mm_id: Mutex<HashMap<String, Option<String>>>,
    username: Mutex<HashMap<String, String>>,
    membership_ensured: Mutex<HashSet<(String, String)>>,
}

impl ExportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn channel_mattermost_id(
        &self,
        ctx: &ExportCtx,
        channel_slack_id: &str,
    ) -> Result<Option<String>, ExportError> {
        if let Some(hit) = self.channel_mm_id.lock().unwrap().get(channel_slack_id).cloned() {
            return Ok(hit);
        }
        let resolved = ctx
            .entities
            .find_one(EntityKind::Channel, channel_slack_id, None)
            .await?
            .and_then(|c| c.mattermost_id);
        self.channel_mm_id.lock().unwrap().insert(channel_slack_id.to_string(), resolved.clone());
        Ok(resolved)
    }

    pub async fn channel_name(&self, ctx: &ExportCtx, channel_slack_id: &str) -> Result<String, ExportError> {
        if let Some(hit) = self.channel_name.lock().unwrap().get(channel_slack_id).cloned() {
            return Ok(hit);
        }
        let name = ctx
            .entities
            .find_one(EntityKind::Channel, channel_slack_id, None)
            .await?
            .and_then(|c| c.raw_data.get("name").and_then(|v| v.as_str().map(str::to_string)))
            .unwrap_or_else(|| channel_slack_id.to_string());
        self.channel_name.lock().unwrap().insert(channel_slack_id.to_string(), name.clone());
        Ok(name)
    }

    pub async fn user_mattermost_id(&self, ctx: &ExportCtx, user_slack_id: &str) -> Result<Option<String>, ExportError> {
        if let Some(hit) = self.user_mm_id.lock().unwrap().get(user_slack_id).cloned() {
            return Ok(hit);
        }
        let resolved = ctx
            .entities
            .find_one(EntityKind::User, user_slack_id, None)
            .await?
            .and_then(|u| u.mattermost_id);
        self.user_mm_id.lock().unwrap().insert(user_slack_id.to_string(), resolved.clone());
        Ok(resolved)
    }

    pub async fn username(&self, ctx: &ExportCtx, user_slack_id: &str) -> Result<String, ExportError> {
        if let Some(hit) = self.username.lock().unwrap().get(user_slack_id).cloned() {
            return Ok(hit);
        }
        let name = ctx
            .entities
            .find_one(EntityKind::User, user_slack_id, None)
            .await?
            .and_then(|u| {
                u.raw_data
                    .get("profile")
                    .and_then(|p| p.get("display_name").and_then(|v| v.as_str().map(str::to_string)))
                    .or_else(|| u.raw_data.get("name").and_then(|v| v.as_str().map(str::to_string)))
            })
            .unwrap_or_else(|| user_slack_id.to_string());
        self.username.lock().unwrap().insert(user_slack_id.to_string(), name.clone());
        Ok(name)
    }

    /// Best-effort, idempotent: adds `user_mm_id` to `channel_mm_id` via the
    /// plugin, swallowing failures (already-a-member, DM/GDM channels that
    /// don't support membership calls) and only issuing the request once per
    /// pair for the lifetime of this cache.
    pub async fn ensure_member(&self, ctx: &ExportCtx, channel_mm_id: &str, user_mm_id: &str) {
        let key = (channel_mm_id.to_string(), user_mm_id.to_string());
        if !self.membership_ensured.lock().unwrap().insert(key) {
            return;
        }
        let _ = ctx
            .rt
            .mm
            .post_json(
                &format!("{PLUGIN_BASE}/channel/members"),
                &serde_json::json!({ "channel_id": channel_mm_id, "user_ids": [user_mm_id] }),
            )
            .await;
    }
}
