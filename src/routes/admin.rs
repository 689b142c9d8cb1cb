// ============================================================================
// ADMIN - Ingestion & lifecycle
// ============================================================================
//
// POST /admin/groups               Ingest a group with fixtures + variants
// POST /admin/groups/{id}/status   Move a group through its lifecycle
// PUT  /admin/payout-rules         Validate + store a tier table
// ============================================================================

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{require_admin, ApiError, ApiJson, ApiPath, AppState};
use crate::domain::GroupStatus;
use crate::ingest::GroupPayload;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: GroupStatus,
}

#[derive(Debug, Deserialize)]
pub struct PayoutRuleRequest {
    pub site: String,
    pub jackpot_type: String,
    pub tiers: Value,
}

pub async fn ingest_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<GroupPayload>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    let report = state.ingest.ingest_group(payload).await?;
    Ok(Json(json!({ "ok": true, "report": report })))
}

pub async fn set_group_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    let group = state.ingest.set_group_status(group_id, req.status).await?;
    Ok(Json(json!({ "ok": true, "group": group })))
}

pub async fn put_payout_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<PayoutRuleRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    let table = state
        .ingest
        .put_payout_rule(&req.site, &req.jackpot_type, &req.tiers)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "site": req.site.trim(),
        "jackpot_type": req.jackpot_type.trim(),
        "tiers": table,
    })))
}
