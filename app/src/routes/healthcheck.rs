use serde_json::json;

use crate::utils::response::APIResponse;

pub async fn healthcheck() -> APIResponse {
    APIResponse::json(json!({ "status": "ok" }))
}
