// ============================================================================
// TEST HELPERS - Shared utilities for integration tests
// ============================================================================

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use hunter::auth::{bearer_token, AuthError, UserVerifier};
use hunter::domain::*;
use hunter::ingest::{GroupPayload, IngestService};
use hunter::{AppState, JackpotStore, MemoryStore, TierPolicy};
use serde_json::{json, Value};
use uuid::Uuid;

pub const ADMIN_KEY: &str = "test-admin-key";

/// Fresh in-memory store
pub fn create_test_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn as_dyn(store: &Arc<MemoryStore>) -> Arc<dyn JackpotStore> {
    store.clone()
}

/// Accepts `Bearer test-user:<uuid>` in place of a signed access token
pub struct TestTokens;

#[async_trait]
impl UserVerifier for TestTokens {
    async fn verify_user(&self, auth_header: &str) -> Result<Uuid, AuthError> {
        let token = bearer_token(auth_header);
        token
            .strip_prefix("test-user:")
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| AuthError::InvalidToken(token.to_string()))
    }
}

/// App state over the given store, floor tier policy
pub fn create_test_state(store: &Arc<MemoryStore>) -> AppState {
    AppState::new(as_dyn(store), TierPolicy::Floor, ADMIN_KEY, Arc::new(TestTokens))
}

/// Create empty headers (for unauthenticated tests)
pub fn create_empty_headers() -> HeaderMap {
    HeaderMap::new()
}

/// Headers carrying the admin bearer key
pub fn create_admin_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", format!("Bearer {}", ADMIN_KEY).parse().unwrap());
    headers
}

/// Headers carrying a user token accepted by `TestTokens`
pub fn create_user_headers(user_id: Uuid) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", format!("Bearer test-user:{}", user_id).parse().unwrap());
    headers
}

/// Payload for a group with `picks_a.len()` fixtures and a single variant A
pub fn group_payload(site: &str, prize_pool: Option<f64>, picks_a: &[&str]) -> GroupPayload {
    let fixtures: Vec<Value> = (1..=picks_a.len())
        .map(|seq| json!({"seq": seq, "home": format!("Home {}", seq), "away": format!("Away {}", seq)}))
        .collect();
    serde_json::from_value(json!({
        "site": site,
        "jackpot_type": "mega",
        "lock_time": Utc::now() + Duration::hours(2),
        "prize_pool": prize_pool,
        "fixtures": fixtures,
        "variants": [{"label": "A", "picks": picks_a}],
    }))
    .unwrap()
}

/// Ingest a group and walk it to `locked`; returns the group id
pub async fn seed_locked_group(store: &Arc<MemoryStore>, site: &str, prize_pool: Option<f64>, picks_a: &[&str]) -> Uuid {
    let ingest = IngestService::new(as_dyn(store));
    let report = ingest.ingest_group(group_payload(site, prize_pool, picks_a)).await.unwrap();
    ingest.set_group_status(report.group_id, GroupStatus::Active).await.unwrap();
    ingest.set_group_status(report.group_id, GroupStatus::Locked).await.unwrap();
    report.group_id
}

pub async fn store_tiers(store: &Arc<MemoryStore>, site: &str, tiers: Value) {
    IngestService::new(as_dyn(store))
        .put_payout_rule(site, "mega", &tiers)
        .await
        .unwrap();
}

/// Fixture edits marking every fixture finished with the given results (seq order)
pub async fn finish_all(store: &Arc<MemoryStore>, group_id: Uuid, results: &[Pick]) -> Vec<FixtureUpdate> {
    let fixtures = store.list_fixtures(group_id).await.unwrap();
    fixtures
        .iter()
        .zip(results)
        .map(|(f, r)| FixtureUpdate {
            fixture_id: f.id,
            status: FixtureStatus::Finished,
            result: Some(*r),
            final_score: None,
        })
        .collect()
}

pub fn seed_cycle(store: &MemoryStore, status: CycleStatus, credit_cost: i64, max_end_at: Option<DateTime<Utc>>, group_ids: Vec<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    store.put_cycle(Cycle {
        id,
        status,
        credit_cost,
        max_end_at,
        group_ids,
        winning_platform: None,
    });
    id
}

pub fn seed_participant(store: &MemoryStore, cycle_id: Uuid, user_id: Uuid, sites: &[&str]) -> Uuid {
    let id = Uuid::new_v4();
    store.put_participant(Participant {
        id,
        cycle_id,
        user_id,
        sites_selected: sites.iter().map(|s| s.to_string()).collect(),
        personal_outcome: PersonalOutcome::Pending,
        rollover_credit: false,
    });
    id
}

pub fn seed_user(store: &MemoryStore, credits: i64) -> Uuid {
    let id = Uuid::new_v4();
    store.put_profile(id, credits);
    id
}
