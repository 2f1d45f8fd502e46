use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

use crate::config::config::Config;
use crate::mm::client::{MattermostClient, MmApiError};
use crate::mm::slack_client::SlackClient;

/// Fallback team id used by the source system when neither `MM_TEAM_ID` nor
/// a `MM_TEAM` name lookup resolves one. Kept as a last resort so exports
/// never hard-fail purely on team resolution.
const FALLBACK_TEAM_ID: &str = "b7u9rycm43nip86mdiuqsxdcbe";

/// The crate's shared, process-wide collaborators, threaded explicitly
/// through the import and export pipelines instead of living as package-level
/// singletons. Cheap to clone: everything inside is already an `Arc`/pool
/// handle.
#[derive(Clone)]
pub struct Runtime {
    pub db: DatabaseConnection,
    pub mm: Arc<MattermostClient>,
    pub slack: Option<Arc<SlackClient>>,
    pub config: Config,
    /// Held for the duration of one `orchestrate_export` call; guarantees at
    /// most one export loop runs at a time.
    pub export_lock: Arc<Mutex<()>>,
    team_id: Arc<OnceCell<String>>,
    bot_user_id: Arc<OnceCell<String>>,
}

impl Runtime {
    pub fn new(db: DatabaseConnection, config: Config) -> Result<Self, MmApiError> {
        let mm = MattermostClient::new(
            config.mm_url.clone(),
            config.mm_token.clone(),
            config.mm_max_connections,
            config.mm_max_keepalive,
            config.mm_http2,
        )?;
        let slack = config
            .slack_bot_token
            .clone()
            .map(|token| Arc::new(SlackClient::new(token)));
        Ok(Self {
            db,
            mm: Arc::new(mm),
            slack,
            config,
            export_lock: Arc::new(Mutex::new(())),
            team_id: Arc::new(OnceCell::new()),
            bot_user_id: Arc::new(OnceCell::new()),
        })
    }

    /// Resolves the Mattermost team id once per process: `MM_TEAM_ID` env,
    /// then a name lookup via `MM_TEAM`, then a fixed fallback constant.
    pub async fn team_id(&self) -> String {
        if let Some(id) = self.team_id.get() {
            return id.clone();
        }
        let resolved = self.resolve_team_id().await;
        self.team_id.get_or_init(|| async { resolved }).await.clone()
    }

    async fn resolve_team_id(&self) -> String {
        if let Some(id) = &self.config.mm_team_id {
            return id.clone();
        }
        if let Some(name) = &self.config.mm_team {
            match self.mm.get(&format!("/api/v4/teams/name/{name}")).await {
                Ok(resp) => match resp.json::<Value>().await {
                    Ok(body) => {
                        if let Some(id) = body.get("id").and_then(Value::as_str) {
                            return id.to_string();
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to parse team lookup response"),
                },
                Err(e) => warn!(error = %e, "failed to resolve team by name"),
            }
        }
        FALLBACK_TEAM_ID.to_string()
    }

    /// Resolves the id of the user the crate's API token authenticates as,
    /// once per process. Used as `creator_id` for custom emoji and as the
    /// last-resort message author when a Slack author can't be mapped.
    pub async fn bot_user_id(&self) -> Result<String, MmApiError> {
        if let Some(id) = self.bot_user_id.get() {
            return Ok(id.clone());
        }
        let resp = self.mm.get("/api/v4/users/me").await?;
        let body: Value = resp.json().await?;
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MmApiError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "users/me returned no id".to_string(),
            })?;
        Ok(self.bot_user_id.get_or_init(|| async { id }).await.clone())
    }
}
