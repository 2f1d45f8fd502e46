use std::sync::Arc;

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::core::state::AppState;
use crate::export::orchestrate_export;
use crate::utils::response::{APIError, APIResponse};

#[derive(Deserialize)]
pub struct ExportQuery {
    anchor_job_id: Option<i64>,
}

/// Kicks off the export orchestrator as a background task. The orchestrator
/// itself serializes on `rt.export_lock`; this handler only peeks at the lock
/// to decide which response to send, then lets the spawned task acquire it
/// for real (a benign race: worst case a second caller also observes the lock
/// free and the orchestrator's own loop absorbs the overlap).
pub async fn start_export(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportQuery>,
) -> Result<APIResponse, APIError> {
    if state.runtime.export_lock.try_lock().is_err() {
        return Ok(APIResponse::json(json!({ "status": "already_running" })));
    }

    let rt = state.runtime.clone();
    let anchor_job_id = params.anchor_job_id;
    tokio::spawn(async move {
        if let Err(e) = orchestrate_export(rt, anchor_job_id).await {
            error!(error = %e, "export orchestrator failed");
        }
    });

    Ok(APIResponse::json(json!({ "status": "export_started" })))
}
