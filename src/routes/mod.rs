// ============================================================================
// HUNTER ROUTES - Admin settling + cycle endpoints
// ============================================================================
//
// Route Organization:
// - admin.rs:    Group ingestion, lifecycle moves, payout rules
// - settling.rs: /admin/settling - open, save, preview, lock, repair
// - cycles.rs:   Join (users) and legacy settle (admins)
//
// Admin routes expect `Authorization: Bearer <ADMIN_API_KEY>`.
// User routes expect `Authorization: Bearer <Supabase access token>`.
// Errors are always `{ "ok": false, "error": "..." }`, including bodies and
// path ids that fail to parse.

pub mod admin;
pub mod cycles;
pub mod settling;

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::auth::{AuthError, UserVerifier};
use crate::cycles::{CycleError, CycleService};
use crate::ingest::{IngestError, IngestService};
use crate::settlement::{SettlementError, SettlementService, TierPolicy};
use crate::store::{JackpotStore, StoreError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JackpotStore>,
    pub settlement: SettlementService,
    pub cycles: CycleService,
    pub ingest: IngestService,
    pub auth: Arc<dyn UserVerifier>,
    admin_api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn JackpotStore>,
        tier_policy: TierPolicy,
        admin_api_key: &str,
        auth: Arc<dyn UserVerifier>,
    ) -> Self {
        Self {
            settlement: SettlementService::new(store.clone(), tier_policy),
            cycles: CycleService::new(store.clone()),
            ingest: IngestService::new(store.clone()),
            store,
            auth,
            admin_api_key: Arc::from(admin_api_key),
        }
    }
}

// ============================================================================
// EXTRACTORS
// ============================================================================

/// `Json<T>` whose rejection is an [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Path<T>` whose rejection is an [`ApiError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "ok": false, "error": self.message }))).into_response()
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::InsufficientCredits { .. } => StatusCode::CONFLICT,
        StoreError::Backend(_) | StoreError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::new(store_status(&e), e.to_string())
    }
}

impl From<SettlementError> for ApiError {
    fn from(e: SettlementError) -> Self {
        let status = match &e {
            SettlementError::GroupNotFound(_) => StatusCode::NOT_FOUND,
            SettlementError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SettlementError::MissingResults { .. } | SettlementError::UnknownFixture(_) => StatusCode::BAD_REQUEST,
            SettlementError::Store(inner) => store_status(inner),
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<CycleError> for ApiError {
    fn from(e: CycleError) -> Self {
        let status = match &e {
            CycleError::CycleNotFound(_) => StatusCode::NOT_FOUND,
            CycleError::Closed(_)
            | CycleError::Ended(_)
            | CycleError::NotJoinable
            | CycleError::InsufficientCredits { .. }
            | CycleError::AlreadySettled(_)
            | CycleError::ResultMismatch { .. }
            | CycleError::InvalidCost(_) => StatusCode::CONFLICT,
            CycleError::Store(inner) => store_status(inner),
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let status = match &e {
            IngestError::GroupNotFound(_) => StatusCode::NOT_FOUND,
            IngestError::InvalidTransition { .. } => StatusCode::CONFLICT,
            IngestError::Store(inner) => store_status(inner),
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status = match &e {
            AuthError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(t) if t == &*state.admin_api_key => Ok(()),
        Some(_) => {
            warn!("🚫 Admin request with wrong API key");
            Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid admin credentials"))
        }
        None => Err(ApiError::new(StatusCode::UNAUTHORIZED, "Missing Authorization header")),
    }
}

/// Verified user id from a Supabase access token
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let header = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::from(AuthError::MissingToken))?;

    state.auth.verify_user(header).await.map_err(|e| {
        warn!("🚫 User token rejected: {}", e);
        ApiError::from(e)
    })
}

// ============================================================================
// ROUTER
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": VERSION,
        "store": state.store.backend_name(),
        "tier_policy": state.settlement.policy(),
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Admin ingestion
        .route("/admin/groups", post(admin::ingest_group))
        .route("/admin/groups/{id}/status", post(admin::set_group_status))
        .route("/admin/payout-rules", put(admin::put_payout_rule))
        // Settling
        .route("/admin/settling/{id}", get(settling::summary))
        .route("/admin/settling/{id}/open", post(settling::open))
        .route("/admin/settling/{id}/save", post(settling::save))
        .route("/admin/settling/{id}/preview", post(settling::preview))
        .route("/admin/settling/{id}/lock", post(settling::lock))
        .route("/admin/settling/{id}/repair", post(settling::repair))
        // Cycles
        .route("/admin/cycles/{id}/settle", post(cycles::settle_cycle))
        .route("/cycles/{id}/join", post(cycles::join_cycle))
        .with_state(state)
}
