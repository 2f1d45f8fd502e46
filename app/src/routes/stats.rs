use std::sync::Arc;

use axum::extract::State;
use sea_orm::DbErr;
use serde_json::{json, Value};

use crate::core::state::AppState;
use crate::models::entity_kind::EntityKind;
use crate::models::status_enum::MappingStatus;
use crate::repos::entities::EntitiesRepo;
use crate::utils::response::{APIError, APIResponse};

const ALL_KINDS: [EntityKind; 6] = EntityKind::EXPORT_ORDER;
const ALL_STATUSES: [MappingStatus; 4] =
    [MappingStatus::Pending, MappingStatus::Skipped, MappingStatus::Failed, MappingStatus::Success];

/// Zero-filled `(entity_type, status) -> count` matrix plus a `totals` row,
/// built from the sparse `count_by_status` rows the DB actually returns.
pub async fn mapping_stats_json(entities: &EntitiesRepo) -> Result<Value, DbErr> {
    let rows = entities.count_by_status(None).await?;

    let mut matrix: Value = json!({});
    let mut row_totals: Value = json!({});
    let mut grand_total: i64 = 0;

    for kind in ALL_KINDS {
        let mut by_status = json!({});
        let mut row_total = 0i64;
        for status in ALL_STATUSES {
            let count = rows
                .iter()
                .find(|(t, s, _)| t.as_str() == kind.as_str() && *s == status)
                .map(|(_, _, c)| *c)
                .unwrap_or(0);
            by_status[status.as_str()] = json!(count);
            row_total += count;
        }
        matrix[kind.as_str()] = by_status;
        row_totals[kind.as_str()] = json!(row_total);
        grand_total += row_total;
    }

    Ok(json!({
        "matrix": matrix,
        "totals": row_totals,
        "grand_total": grand_total,
    }))
}

pub async fn mapping_stats(State(state): State<Arc<AppState>>) -> Result<APIResponse, APIError> {
    let entities = EntitiesRepo::new(state.database.clone());
    Ok(APIResponse::json(mapping_stats_json(&entities).await?))
}
