use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api error: {0}")]
    Api(String),
}

/// Minimal client for the two Slack surfaces this crate still needs after
/// import: `emoji.list` (to resolve custom emoji URLs) and authenticated file
/// download. Everything else about the Slack workspace comes from the export
/// archive already on disk.
#[derive(Clone, Debug)]
pub struct SlackClient {
    http: Client,
    token: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
        }
    }

    pub async fn emoji_list(&self) -> Result<std::collections::HashMap<String, String>, SlackApiError> {
        let resp = self
            .http
            .get("https://slack.com/api/emoji.list")
            .bearer_auth(&self.token)
            .timeout(TIMEOUT)
            .send()
            .await?;
        let body: Value = resp.json().await?;
        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let err = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(SlackApiError::Api(err.to_string()));
        }
        let emoji = body
            .get("emoji")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Ok(emoji)
    }

    pub async fn download(&self, url: &str) -> Result<bytes::Bytes, SlackApiError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .timeout(TIMEOUT)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(resp.bytes().await?),
                Ok(resp) if attempt < 3 => {
                    sleep(Duration::from_secs(attempt)).await;
                    let _ = resp;
                    continue;
                }
                Ok(resp) => {
                    return Err(SlackApiError::Api(format!(
                        "download failed with status {}",
                        resp.status()
                    )))
                }
                Err(_) if attempt < 3 => {
                    sleep(Duration::from_secs(attempt)).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
