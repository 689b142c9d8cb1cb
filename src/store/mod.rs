//! Backend Store - the hosted Postgres behind one injected interface
//!
//! Handlers never reach for a global client. A single `Arc<dyn JackpotStore>`
//! is built at start-up and carried in the axum state.
//!
//! - `SupabaseStore`: PostgREST + RPC calls against the hosted project
//! - `MemoryStore`:   in-process tables for tests and local runs

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::*;
use crate::settlement::TierTable;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Backend request failed: {0}")]
    Backend(String),

    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound { entity, id: id.to_string() }
    }
}

/// Result of the `settle_group_and_update_cycles` procedure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub cycles_updated: u32,
    pub cycles_won_now: u32,
}

#[async_trait]
pub trait JackpotStore: Send + Sync {
    /// Short name for logs and /health
    fn backend_name(&self) -> &'static str;

    // Groups
    async fn get_group(&self, id: Uuid) -> StoreResult<Option<JackpotGroup>>;
    async fn insert_group(&self, group: &JackpotGroup) -> StoreResult<()>;
    async fn update_group_status(&self, id: Uuid, status: GroupStatus) -> StoreResult<()>;

    // Fixtures
    async fn list_fixtures(&self, group_id: Uuid) -> StoreResult<Vec<Fixture>>;
    async fn insert_fixtures(&self, fixtures: &[Fixture]) -> StoreResult<()>;
    async fn upsert_fixtures(&self, fixtures: &[Fixture]) -> StoreResult<()>;

    // Variants + predictions
    async fn list_variants(&self, group_id: Uuid) -> StoreResult<Vec<Variant>>;
    async fn insert_variants(&self, variants: &[Variant]) -> StoreResult<()>;
    async fn list_predictions(&self, variant_ids: &[Uuid]) -> StoreResult<Vec<Prediction>>;
    async fn insert_predictions(&self, predictions: &[Prediction]) -> StoreResult<()>;

    // Settlements (unique per variant)
    async fn list_settlements(&self, group_id: Uuid) -> StoreResult<Vec<VariantSettlement>>;
    async fn upsert_settlements(&self, settlements: &[VariantSettlement]) -> StoreResult<()>;

    // Payout rules
    async fn get_payout_rule(&self, site: &str, jackpot_type: &str) -> StoreResult<Option<TierTable>>;
    async fn upsert_payout_rule(&self, site: &str, jackpot_type: &str, tiers: &TierTable) -> StoreResult<()>;

    // Cycles (legacy)
    async fn get_cycle(&self, id: Uuid) -> StoreResult<Option<Cycle>>;
    /// Store a legacy settlement result (status and the platform that won)
    async fn record_cycle_result(&self, id: Uuid, status: CycleStatus, winning_platform: Option<&str>) -> StoreResult<()>;
    async fn list_cycle_groups(&self, cycle_id: Uuid) -> StoreResult<Vec<JackpotGroup>>;
    async fn get_subscription(&self, cycle_id: Uuid, user_id: Uuid) -> StoreResult<Option<CycleSubscription>>;
    /// Insert unless a row for (cycle, user) exists. `false` means another
    /// request already holds it.
    async fn claim_subscription(&self, subscription: &CycleSubscription) -> StoreResult<bool>;
    async fn release_subscription(&self, cycle_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    async fn list_participants(&self, cycle_id: Uuid) -> StoreResult<Vec<Participant>>;
    async fn update_participant(&self, participant: &Participant) -> StoreResult<()>;

    // Wallets
    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    /// Atomically add `delta` to a wallet and return the new balance.
    /// Fails with `InsufficientCredits` instead of going negative.
    async fn adjust_credits(&self, user_id: Uuid, delta: i64) -> StoreResult<i64>;

    /// Cascade a settled group into its cycles and wallets
    async fn cascade_group_settlement(&self, group_id: Uuid) -> StoreResult<CascadeSummary>;
}
