// ============================================================================
// CYCLES - Join (users) + legacy settle (admins)
// ============================================================================
//
// POST /cycles/{id}/join            Authorization: Bearer <access token>
// POST /admin/cycles/{id}/settle    { "winning_platform": "sportpesa" | null }
//
// The joining user is the `sub` of the verified Supabase access token.
// ============================================================================

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_admin, require_user, ApiError, ApiJson, ApiPath, AppState};
use crate::cycles::{CycleSettlement, JoinReceipt};

#[derive(Debug, Deserialize)]
pub struct SettleCycleRequest {
    #[serde(default)]
    pub winning_platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub receipt: JoinReceipt,
}

#[derive(Debug, Serialize)]
pub struct SettleCycleResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub settlement: CycleSettlement,
}

pub async fn join_cycle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(cycle_id): ApiPath<Uuid>,
) -> Result<Json<JoinResponse>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let receipt = state.cycles.join_cycle(user_id, cycle_id, Utc::now()).await?;
    Ok(Json(JoinResponse { ok: true, receipt }))
}

pub async fn settle_cycle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(cycle_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SettleCycleRequest>,
) -> Result<Json<SettleCycleResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let settlement = state
        .cycles
        .settle_cycle(cycle_id, req.winning_platform.as_deref())
        .await?;
    Ok(Json(SettleCycleResponse { ok: true, settlement }))
}
