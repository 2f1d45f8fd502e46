use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::{json, Value};
use tracing::warn;

use crate::models::entity::Model as EntityModel;

use super::super::ctx::{ExportCtx, ExportOutcome};
use super::super::error::ExportError;

const AVATAR_FIELDS: [&str; 6] =
    ["image_1024", "image_512", "image_192", "image_original", "image_72", "image_48"];

fn auth_data(username: &str) -> String {
    let mut hasher = DefaultHasher::new();
    username.hash(&mut hasher);
    (hasher.finish() % 100_000).to_string()
}

fn avatar_url(profile: &Value) -> Option<String> {
    AVATAR_FIELDS.iter().find_map(|field| {
        profile
            .get(field)
            .and_then(Value::as_str)
            .filter(|url| !url.contains("gravatar.com"))
            .map(str::to_string)
    })
}

fn split_real_name(profile: &Value) -> (String, String) {
    if let (Some(first), Some(last)) = (
        profile.get("first_name").and_then(Value::as_str),
        profile.get("last_name").and_then(Value::as_str),
    ) {
        return (first.to_string(), last.to_string());
    }
    let real_name = profile
        .get("real_name")
        .and_then(Value::as_str)
        .or_else(|| profile.get("display_name").and_then(Value::as_str))
        .unwrap_or("");
    match real_name.split_once(' ') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (real_name.to_string(), String::new()),
    }
}

/// Creates the Mattermost user for one Slack `user` entity, recovering the
/// id on a duplicate-email/username conflict, and best-effort uploads an
/// avatar from the highest-resolution non-Gravatar profile image.
pub async fn export_user(ctx: &ExportCtx, entity: &EntityModel) -> Result<ExportOutcome, ExportError> {
    let profile = entity.raw_data.get("profile").cloned().unwrap_or(json!({}));
    let username = profile
        .get("display_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| entity.raw_data.get("name").and_then(Value::as_str))
        .unwrap_or(&entity.slack_id)
        .to_string();
    let email = profile
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}@imported.invalid", entity.slack_id));
    let (first_name, last_name) = split_real_name(&profile);

    let payload = json!({
        "username": sanitize_username(&username),
        "email": email,
        "first_name": first_name,
        "last_name": last_name,
        "position": profile.get("title").and_then(Value::as_str).unwrap_or(""),
        "locale": entity.raw_data.get("locale").and_then(Value::as_str).unwrap_or("en"),
        "timezone": {
            "useAutomaticTimezone": "false",
            "manualTimezone": profile.get("tz").and_then(Value::as_str).unwrap_or("UTC"),
            "automaticTimezone": "",
        },
        "auth_service": "gitlab",
        "auth_data": auth_data(&username),
    });

    let mattermost_id = match ctx.rt.mm.post_json("/api/v4/users", &payload).await {
        Ok(resp) => {
            let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
            body.get("id").and_then(Value::as_str).map(str::to_string)
        }
        Err(crate::mm::client::MmApiError::Status { body, .. }) if is_duplicate(&body) => {
            recover_existing_id(ctx, &body, &email, &username).await?
        }
        Err(e) => return Err(e.into()),
    };

    let Some(mattermost_id) = mattermost_id else {
        return Err(ExportError::MissingPrerequisite(format!(
            "user creation for {} returned no id",
            entity.slack_id
        )));
    };

    if let Some(url) = avatar_url(&profile) {
        if let Err(e) = upload_avatar(ctx, &mattermost_id, &url).await {
            warn!(user = %entity.slack_id, error = %e, "avatar upload failed, continuing");
        }
    }

    Ok(ExportOutcome::Success(mattermost_id))
}

fn sanitize_username(username: &str) -> String {
    let lowered = username.to_lowercase();
    let sanitized: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "imported_user".to_string()
    } else {
        sanitized
    }
}

fn is_duplicate(body: &str) -> bool {
    body.contains("email_exists") || body.contains("username_exists")
}

async fn recover_existing_id(
    ctx: &ExportCtx,
    body: &str,
    email: &str,
    username: &str,
) -> Result<Option<String>, ExportError> {
    let path = if body.contains("email_exists") {
        format!("/api/v4/users/email/{email}")
    } else {
        format!("/api/v4/users/username/{}", sanitize_username(username))
    };
    let resp = ctx.rt.mm.get(&path).await?;
    let body: Value = resp.json().await.map_err(crate::mm::client::MmApiError::from)?;
    Ok(body.get("id").and_then(Value::as_str).map(str::to_string))
}

async fn upload_avatar(ctx: &ExportCtx, mattermost_id: &str, url: &str) -> Result<(), ExportError> {
    let bytes = ctx.rt.mm.download(url, None).await?;
    ctx.rt
        .mm
        .post_multipart_bytes(
            &format!("/api/v4/users/{mattermost_id}/image"),
            &[],
            "image",
            "avatar.png".to_string(),
            bytes,
        )
        .await?;
    Ok(())
}
