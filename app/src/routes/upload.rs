use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use serde_json::json;
use tracing::{error, info};

use crate::core::state::AppState;
use crate::import::run_import;
use crate::repos::jobs::JobsRepo;
use crate::utils::response::{APIError, APIResponse};

/// Accepts a multipart `.zip` Slack export, stashes it to a temp path, and
/// spawns the import pipeline as a background task against a fresh job row.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<APIResponse, APIError> {
    let mut filename = String::new();
    let mut bytes = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| APIError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("upload.zip").to_string();
            bytes = field
                .bytes()
                .await
                .map_err(|e| APIError::BadRequest(format!("failed to read upload: {e}")))?
                .to_vec();
        }
    }

    if bytes.is_empty() {
        return Err(APIError::BadRequest("missing multipart field `file`".to_string()));
    }
    if !filename.to_lowercase().ends_with(".zip") {
        return Err(APIError::BadRequest("uploaded file must be a .zip archive".to_string()));
    }

    let jobs = JobsRepo::new(state.database.clone());
    let job = jobs.create().await?;

    let zip_path: PathBuf = std::env::temp_dir().join(format!("mm-importer-upload-{}.zip", job.id));
    tokio::fs::write(&zip_path, &bytes)
        .await
        .map_err(|e| APIError::InternalServerError(format!("failed to stash upload: {e}")))?;

    info!(job_id = job.id, filename, bytes = bytes.len(), "accepted upload, starting import");

    let rt = state.runtime.clone();
    let job_id = job.id;
    tokio::spawn(async move {
        if let Err(e) = run_import(rt, job_id, zip_path).await {
            error!(job_id, error = %e, "import pipeline failed");
        }
    });

    Ok(APIResponse::json(json!({
        "filename": filename,
        "size": bytes.len(),
        "status": "processing",
        "job_id": job.id,
    })))
}
