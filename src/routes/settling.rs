// ============================================================================
// SETTLING - /admin/settling/{id}
// ============================================================================
//
// GET  /admin/settling/{id}          Group, fixtures, variants, settlements
// POST /admin/settling/{id}/open     locked → settling
// POST /admin/settling/{id}/save     Save fixture edits
// POST /admin/settling/{id}/preview  Grade edits without saving
// POST /admin/settling/{id}/lock     Lock Results (persist + settle + cascade)
// POST /admin/settling/{id}/repair   Re-run grading + cascade on a settled group
//
// Lock Results response:
// {
//   "ok": true,
//   "group_id": "...",
//   "fixtures_saved": 13,
//   "settlements": [ { "variant_id": "...", "correct_count": 12, ... } ],
//   "cascade": { "status": "completed", "cycles_updated": 3, "cycles_won_now": 1 }
// }
// A failed cascade still answers 200, with
//   "cascade": { "status": "failed", "reason": "..." }
// ============================================================================

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{require_admin, ApiError, ApiJson, ApiPath, AppState};
use crate::domain::{FixtureUpdate, VariantSettlement};
use crate::settlement::SettlementOutcome;

#[derive(Debug, Default, Deserialize)]
pub struct FixtureEdits {
    #[serde(default)]
    pub fixtures: Vec<FixtureUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    #[serde(default)]
    pub fixtures: Vec<FixtureUpdate>,
    #[serde(default = "default_settled_by")]
    pub settled_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RepairRequest {
    #[serde(default = "default_settled_by")]
    pub settled_by: String,
}

fn default_settled_by() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CascadeStatus {
    Completed { cycles_updated: u32, cycles_won_now: u32 },
    Failed { reason: String },
}

#[derive(Debug, Serialize)]
pub struct LockResponse {
    pub ok: bool,
    pub group_id: Uuid,
    pub fixtures_saved: usize,
    pub settlements: Vec<VariantSettlement>,
    pub cascade: CascadeStatus,
}

impl From<SettlementOutcome> for LockResponse {
    fn from(outcome: SettlementOutcome) -> Self {
        let (report, cascade) = match outcome {
            SettlementOutcome::Settled { report, cascade } => (
                report,
                CascadeStatus::Completed {
                    cycles_updated: cascade.cycles_updated,
                    cycles_won_now: cascade.cycles_won_now,
                },
            ),
            SettlementOutcome::SettledWithCascadeFailure { report, reason } => {
                (report, CascadeStatus::Failed { reason })
            }
        };
        LockResponse {
            ok: true,
            group_id: report.group_id,
            fixtures_saved: report.fixtures_saved,
            settlements: report.settlements,
            cascade,
        }
    }
}

pub async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    let snapshot = state.settlement.summary(group_id).await?;
    Ok(Json(json!({ "ok": true, "snapshot": snapshot })))
}

pub async fn open(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    let group = state.settlement.open(group_id).await?;
    Ok(Json(json!({ "ok": true, "group": group })))
}

pub async fn save(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<FixtureEdits>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    let fixtures = state.settlement.save_progress(group_id, &req.fixtures).await?;
    Ok(Json(json!({ "ok": true, "fixtures": fixtures })))
}

pub async fn preview(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<FixtureEdits>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    let preview = state.settlement.preview(group_id, &req.fixtures).await?;
    Ok(Json(json!({ "ok": true, "preview": preview })))
}

pub async fn lock(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let outcome = state
        .settlement
        .lock_results(group_id, &req.fixtures, &req.settled_by)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn repair(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RepairRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let outcome = state.settlement.repair(group_id, &req.settled_by).await?;
    Ok(Json(outcome.into()))
}
