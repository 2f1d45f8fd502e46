use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_server_ip")]
    pub server_ip: String,

    #[serde(default = "default_db_pool_size")]
    pub db_pool_size: u32,
    #[serde(default = "default_db_max_overflow")]
    pub db_max_overflow: u32,
    #[serde(default = "default_db_pool_timeout")]
    pub db_pool_timeout: u64,

    pub mm_url: String,
    pub mm_token: String,
    #[serde(default)]
    pub mm_team: Option<String>,
    #[serde(default)]
    pub mm_team_id: Option<String>,
    #[serde(default = "default_mm_max_connections")]
    pub mm_max_connections: usize,
    #[serde(default = "default_mm_max_keepalive")]
    pub mm_max_keepalive: usize,
    #[serde(default, deserialize_with = "bool_from_env")]
    pub mm_http2: bool,

    #[serde(default)]
    pub slack_bot_token: Option<String>,

    #[serde(default = "default_export_workers")]
    pub export_workers: usize,
    #[serde(default)]
    pub attachment_workers: Option<usize>,
    #[serde(default)]
    pub export_channel_concurrency: Option<usize>,
    #[serde(default = "default_export_queue_poll")]
    pub export_queue_poll: f64,
    #[serde(default)]
    pub attachment_max_mb: Option<u64>,
    #[serde(default = "default_attachment_multipart", deserialize_with = "bool_from_env")]
    pub attachment_multipart: bool,

    #[serde(default)]
    pub test_run: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_db_pool_size() -> u32 {
    10
}
fn default_db_max_overflow() -> u32 {
    5
}
fn default_db_pool_timeout() -> u64 {
    30
}
fn default_mm_max_connections() -> usize {
    100
}
fn default_mm_max_keepalive() -> usize {
    20
}
fn default_export_workers() -> usize {
    5
}
fn default_export_queue_poll() -> f64 {
    2.0
}
fn default_attachment_multipart() -> bool {
    true
}

/// `envy` hands every env var over as a bare string and `bool`'s own
/// `Deserialize` impl only accepts `"true"`/`"false"`; this accepts the
/// documented `0`/`1` spelling too (e.g. `ATTACHMENT_MULTIPART=0`).
fn bool_from_env<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean `{other}`, expected 0/1/true/false"))),
    }
}

impl Config {
    pub fn load_envs() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn attachment_workers(&self) -> usize {
        self.attachment_workers.unwrap_or(self.export_workers)
    }

    pub fn export_channel_concurrency(&self) -> usize {
        self.export_channel_concurrency.unwrap_or(self.export_workers)
    }
}
