//! API Tests - handlers called directly with extracted arguments
//!
//! - Admin bearer key enforcement
//! - Ingest -> lifecycle -> payout rule -> lock over HTTP handlers
//! - Error status mapping, including bodies and ids that fail to parse

mod test_helpers;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use hunter::domain::*;
use hunter::routes::admin::{self, PayoutRuleRequest, StatusRequest};
use hunter::routes::cycles::{self, SettleCycleRequest};
use hunter::routes::settling::{self, CascadeStatus, FixtureEdits, LockRequest, RepairRequest};
use hunter::routes::{health, require_admin, ApiJson, ApiPath};
use serde_json::json;
use test_helpers::*;
use tower::ServiceExt;
use uuid::Uuid;

async fn ingest_via_api(state: &hunter::AppState, picks: &[&str]) -> Uuid {
    let Json(body) = admin::ingest_group(
        State(state.clone()),
        create_admin_headers(),
        ApiJson(group_payload("sportpesa", Some(1_000_000.0), picks)),
    )
    .await
    .unwrap();
    assert_eq!(body["ok"], true);
    serde_json::from_value(body["report"]["group_id"].clone()).unwrap()
}

async fn move_to(state: &hunter::AppState, group_id: Uuid, status: GroupStatus) {
    admin::set_group_status(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(group_id),
        ApiJson(StatusRequest { status }),
    )
    .await
    .unwrap();
}

// ============================================================================
// AUTH
// ============================================================================

#[tokio::test]
async fn test_admin_routes_require_bearer_key() {
    let store = create_test_store();
    let state = create_test_state(&store);

    let err = settling::summary(State(state.clone()), create_empty_headers(), ApiPath(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);

    let mut wrong = create_empty_headers();
    wrong.insert("authorization", "Bearer nope".parse().unwrap());
    let err = require_admin(&state, &wrong).unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);

    assert!(require_admin(&state, &create_admin_headers()).is_ok());
}

#[tokio::test]
async fn test_unauthorized_ingest_writes_nothing() {
    let store = create_test_store();
    let state = create_test_state(&store);

    let err = admin::ingest_group(
        State(state.clone()),
        create_empty_headers(),
        ApiJson(group_payload("sportpesa", None, &["1"])),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// SETTLING OVER HTTP
// ============================================================================

#[tokio::test]
async fn test_full_settling_flow_via_handlers() {
    let store = create_test_store();
    let state = create_test_state(&store);

    let group_id = ingest_via_api(&state, &["1", "X", "2"]).await;
    move_to(&state, group_id, GroupStatus::Active).await;
    move_to(&state, group_id, GroupStatus::Locked).await;

    admin::put_payout_rule(
        State(state.clone()),
        create_admin_headers(),
        ApiJson(PayoutRuleRequest {
            site: "sportpesa".into(),
            jackpot_type: "mega".into(),
            tiers: json!({"3": {"kind": "full"}, "2": {"kind": "percent", "pct": 0.1}}),
        }),
    )
    .await
    .unwrap();

    let cycle = seed_cycle(&store, CycleStatus::Active, 5, None, vec![group_id]);
    let updates = finish_all(&store, group_id, &[Pick::Home, Pick::Draw, Pick::Home]).await;

    let Json(preview) = settling::preview(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(group_id),
        ApiJson(FixtureEdits { fixtures: updates.clone() }),
    )
    .await
    .unwrap();
    assert_eq!(preview["preview"]["grades"][0]["correct_count"], 2);

    let Json(response) = settling::lock(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(group_id),
        ApiJson(LockRequest { fixtures: updates, settled_by: "ops".into() }),
    )
    .await
    .unwrap();

    assert!(response.ok);
    assert_eq!(response.fixtures_saved, 3);
    assert_eq!(response.settlements.len(), 1);
    assert_eq!(response.settlements[0].tier_hit.as_deref(), Some("2_correct"));
    assert_eq!(response.settlements[0].payout_estimated, Some(100_000.0));
    assert_eq!(response.settlements[0].settled_by, "ops");
    assert_eq!(
        response.cascade,
        CascadeStatus::Completed { cycles_updated: 1, cycles_won_now: 1 }
    );
    assert_eq!(store.cycle(cycle).unwrap().status, CycleStatus::Won);

    // Locking again is a state conflict
    let err = settling::lock(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(group_id),
        ApiJson(LockRequest { fixtures: vec![], settled_by: "ops".into() }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_lock_reports_cascade_failure_then_repair() {
    let store = create_test_store();
    let state = create_test_state(&store);

    let group_id = seed_locked_group(&store, "betika", Some(500.0), &["1", "2"]).await;
    store_tiers(&store, "betika", json!({"2": 500})).await;
    let updates = finish_all(&store, group_id, &[Pick::Home, Pick::Away]).await;

    store.set_cascade_failure(true);
    let Json(response) = settling::lock(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(group_id),
        ApiJson(LockRequest { fixtures: updates, settled_by: "admin".into() }),
    )
    .await
    .unwrap();
    assert!(response.ok);
    assert!(matches!(response.cascade, CascadeStatus::Failed { .. }));
    assert_eq!(response.settlements[0].payout_estimated, Some(500.0));

    // Serialized shape carries the tagged cascade status
    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["cascade"]["status"], "failed");

    store.set_cascade_failure(false);
    let Json(repaired) = settling::repair(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(group_id),
        ApiJson(RepairRequest { settled_by: "admin".into() }),
    )
    .await
    .unwrap();
    assert_eq!(repaired.fixtures_saved, 0);
    assert!(matches!(repaired.cascade, CascadeStatus::Completed { .. }));
}

#[tokio::test]
async fn test_lock_with_missing_results_is_bad_request() {
    let store = create_test_store();
    let state = create_test_state(&store);
    let group_id = seed_locked_group(&store, "sportpesa", None, &["1", "1"]).await;

    let fixtures = hunter::JackpotStore::list_fixtures(&*store, group_id).await.unwrap();
    let unresulted = vec![FixtureUpdate {
        fixture_id: fixtures[0].id,
        status: FixtureStatus::Finished,
        result: None,
        final_score: None,
    }];

    let err = settling::lock(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(group_id),
        ApiJson(LockRequest { fixtures: unresulted, settled_by: "admin".into() }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_group_is_not_found() {
    let store = create_test_store();
    let state = create_test_state(&store);
    let err = settling::open(State(state.clone()), create_admin_headers(), ApiPath(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_tier_table_is_rejected() {
    let store = create_test_store();
    let state = create_test_state(&store);

    let err = admin::put_payout_rule(
        State(state.clone()),
        create_admin_headers(),
        ApiJson(PayoutRuleRequest {
            site: "sportpesa".into(),
            jackpot_type: "mega".into(),
            tiers: json!({"13": {"kind": "mystery"}}),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// CYCLES OVER HTTP
// ============================================================================

#[tokio::test]
async fn test_join_and_errors_map_to_status_codes() {
    let store = create_test_store();
    let state = create_test_state(&store);
    let user = seed_user(&store, 6);
    let cycle = seed_cycle(&store, CycleStatus::Waiting, 5, Some(Utc::now() + chrono::Duration::days(1)), vec![]);

    let Json(joined) = cycles::join_cycle(State(state.clone()), create_user_headers(user), ApiPath(cycle))
        .await
        .unwrap();
    assert!(joined.ok);
    assert_eq!(joined.receipt.credits_remaining, Some(1));

    let other = seed_cycle(&store, CycleStatus::Waiting, 5, None, vec![]);
    let err = cycles::join_cycle(State(state.clone()), create_user_headers(user), ApiPath(other))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);

    let won = seed_cycle(&store, CycleStatus::Won, 5, None, vec![]);
    let err = cycles::join_cycle(State(state.clone()), create_user_headers(user), ApiPath(won))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);

    let err = cycles::join_cycle(State(state.clone()), create_user_headers(user), ApiPath(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_settle_cycle_requires_admin() {
    let store = create_test_store();
    let state = create_test_state(&store);
    let cycle = seed_cycle(&store, CycleStatus::Active, 5, None, vec![]);
    let user = seed_user(&store, 0);
    seed_participant(&store, cycle, user, &["betika"]);

    let err = cycles::settle_cycle(
        State(state.clone()),
        create_empty_headers(),
        ApiPath(cycle),
        ApiJson(SettleCycleRequest { winning_platform: Some("betika".into()) }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);

    let Json(settled) = cycles::settle_cycle(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(cycle),
        ApiJson(SettleCycleRequest { winning_platform: Some("betika".into()) }),
    )
    .await
    .unwrap();
    assert!(settled.ok);
    assert_eq!(settled.settlement.won, 1);
}

#[tokio::test]
async fn test_join_requires_user_token() {
    let store = create_test_store();
    let state = create_test_state(&store);
    let user = seed_user(&store, 10);
    let cycle = seed_cycle(&store, CycleStatus::Waiting, 5, None, vec![]);

    let err = cycles::join_cycle(State(state.clone()), create_empty_headers(), ApiPath(cycle))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);

    let mut forged = create_empty_headers();
    forged.insert("authorization", format!("Bearer {}", user).parse().unwrap());
    let err = cycles::join_cycle(State(state.clone()), forged, ApiPath(cycle))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(store.credits(user), Some(10));

    // The admin key is not a user token either
    let err = cycles::join_cycle(State(state.clone()), create_admin_headers(), ApiPath(cycle))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_resettle_with_other_result_is_conflict() {
    let store = create_test_store();
    let state = create_test_state(&store);
    let cycle = seed_cycle(&store, CycleStatus::Active, 5, None, vec![]);

    cycles::settle_cycle(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(cycle),
        ApiJson(SettleCycleRequest { winning_platform: Some("betika".into()) }),
    )
    .await
    .unwrap();

    let err = cycles::settle_cycle(
        State(state.clone()),
        create_admin_headers(),
        ApiPath(cycle),
        ApiJson(SettleCycleRequest { winning_platform: None }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);
    assert_eq!(store.cycle(cycle).unwrap().status, CycleStatus::Success);
}

// ============================================================================
// MALFORMED REQUESTS (through the router)
// ============================================================================

async fn error_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_malformed_body_gets_json_error() {
    let store = create_test_store();
    let cycle = seed_cycle(&store, CycleStatus::Active, 5, None, vec![]);
    let app = hunter::router(create_test_state(&store));

    let request = Request::builder()
        .method("POST")
        .uri(format!("/admin/cycles/{}/settle", cycle))
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"winning_platform": 7}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = error_body(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["error"].is_string());
    assert_eq!(store.cycle(cycle).unwrap().status, CycleStatus::Active);
}

#[tokio::test]
async fn test_malformed_path_id_gets_json_error() {
    let store = create_test_store();
    let app = hunter::router(create_test_state(&store));

    let request = Request::builder()
        .method("GET")
        .uri("/admin/settling/not-a-uuid")
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = error_body(response).await;
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_health_reports_backend() {
    let store = create_test_store();
    let state = create_test_state(&store);
    let response = health(State(state)).await.into_response();
    assert_eq!(response.status(), StatusCode::OK);
}
