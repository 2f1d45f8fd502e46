use std::path::Path;
use std::time::Duration;

use reqwest::{multipart, Client, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

const STANDARD_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum MmApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mattermost returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl MmApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MmApiError::Http(_) => true,
            MmApiError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

/// Shared, process-wide client for the Mattermost importer plugin and core API.
/// Pool sizing and bearer token are fixed at construction; per-call timeouts
/// vary because attachment uploads must stream unbounded.
#[derive(Clone, Debug)]
pub struct MattermostClient {
    http: Client,
    base_url: String,
    token: String,
}

impl MattermostClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        max_connections: usize,
        max_keepalive: usize,
        http2: bool,
    ) -> Result<Self, MmApiError> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(max_keepalive)
            .pool_idle_timeout(Duration::from_secs(90));
        // reqwest has no single "total connections" knob; max_keepalive is the
        // closest analogue and max_connections informs how many hosts/streams
        // we expect to fan out to, so it is recorded for callers to size worker
        // pools against rather than enforced here.
        let _ = max_connections;
        if http2 {
            builder = builder.http2_prior_knowledge();
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn get(&self, path: &str) -> Result<Response, MmApiError> {
        self.retrying(|| {
            self.http
                .get(self.url(path))
                .bearer_auth(&self.token)
                .timeout(STANDARD_TIMEOUT)
                .send()
        })
        .await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Response, MmApiError> {
        self.retrying(|| {
            self.http
                .post(self.url(path))
                .bearer_auth(&self.token)
                .timeout(STANDARD_TIMEOUT)
                .json(body)
                .send()
        })
        .await
    }

    /// Streams a file already on disk as a multipart part. Never logs the
    /// file bytes; only the filename and size are recorded.
    pub async fn post_multipart_file(
        &self,
        path: &str,
        text_fields: &[(&str, String)],
        file_field: &str,
        file_path: &Path,
        file_name: String,
    ) -> Result<Response, MmApiError> {
        let bytes = tokio::fs::read(file_path).await.map_err(|e| {
            MmApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: format!("reading {}: {e}", file_path.display()),
            }
        })?;
        debug!(file = %file_name, bytes = bytes.len(), "uploading multipart file");

        self.retrying(|| {
            let mut form = multipart::Form::new();
            for (k, v) in text_fields {
                form = form.text(*k, v.clone());
            }
            form = form.part(
                file_field.to_string(),
                multipart::Part::bytes(bytes.clone()).file_name(file_name.clone()),
            );
            self.http
                .post(self.url(path))
                .bearer_auth(&self.token)
                .multipart(form)
                .send()
        })
        .await
    }

    /// Same as `post_multipart_file` but for bytes already in memory (avatar
    /// and emoji image downloads), avoiding a redundant temp-file round trip.
    pub async fn post_multipart_bytes(
        &self,
        path: &str,
        text_fields: &[(&str, String)],
        file_field: &str,
        file_name: String,
        bytes: bytes::Bytes,
    ) -> Result<Response, MmApiError> {
        debug!(file = %file_name, bytes = bytes.len(), "uploading multipart bytes");
        self.retrying(|| {
            let mut form = multipart::Form::new();
            for (k, v) in text_fields {
                form = form.text(*k, v.clone());
            }
            form = form.part(
                file_field.to_string(),
                multipart::Part::bytes(bytes.to_vec()).file_name(file_name.clone()),
            );
            self.http
                .post(self.url(path))
                .bearer_auth(&self.token)
                .multipart(form)
                .send()
        })
        .await
    }

    pub async fn download(&self, url: &str, bearer: Option<&str>) -> Result<bytes::Bytes, MmApiError> {
        let resp = self
            .retrying(|| {
                let mut req = self.http.get(url).timeout(DOWNLOAD_TIMEOUT);
                if let Some(token) = bearer {
                    req = req.bearer_auth(token);
                }
                req.send()
            })
            .await?;
        Ok(resp.bytes().await?)
    }

    async fn retrying<F, Fut>(&self, mut make_request: F) -> Result<Response, MmApiError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match make_request().await {
                Ok(resp) => {
                    if resp.status().is_success() {
                        return Ok(resp);
                    }
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        Err(MmApiError::Status {
                            status,
                            body: "retryable status".into(),
                        })
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(MmApiError::Status { status, body });
                    }
                }
                Err(e) => Err(MmApiError::Http(e)),
            };

            match outcome {
                Ok(resp) => return Ok(resp),
                Err(err) if err.is_retryable() && attempt < RETRY_ATTEMPTS => {
                    let backoff = RETRY_BASE * 2u32.pow(attempt - 1);
                    warn!(attempt, ?backoff, "retrying mattermost request after error: {err}");
                    sleep(backoff).await;
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
