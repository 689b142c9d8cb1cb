//! Hunter Protocol - Jackpot Settlement Service
//!
//! Admins ingest jackpot groups, grade A/B prediction variants against real
//! results, and cascade the outcome into cycles and user wallets.
//!
//! ## Architecture
//!
//! - **Storage**: hosted Supabase (PostgREST + RPC) behind `JackpotStore`
//! - **Server**: Axum
//! - **Settlement**: tier tables + correctness tally + settling state machine
//! - **Wallets**: atomic credit adjustments only
//! - **Auth**: admin API key; Supabase access tokens for users

pub mod auth;
pub mod config;
pub mod cycles;
pub mod domain;
pub mod ingest;
pub mod routes;
pub mod settlement;
pub mod store;
pub mod supabase;

// ============================================================================
// PUBLIC API
// ============================================================================

pub use auth::{AuthError, SupabaseAuth, UserVerifier};
pub use config::{Config, ConfigError, StoreBackend};
pub use cycles::{CycleError, CycleService, JoinReceipt};
pub use ingest::{GroupPayload, IngestError, IngestService};
pub use routes::{router, AppState};
pub use settlement::{
    compute_tier_and_payout, tally_correct, SettlementError, SettlementOutcome, SettlementService, TierPolicy,
    TierTable,
};
pub use store::{CascadeSummary, JackpotStore, MemoryStore, StoreError, SupabaseStore};
