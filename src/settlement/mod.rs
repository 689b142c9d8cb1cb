//! Settlement Module - Grading Jackpot Groups
//!
//! Turns finished fixtures into per-variant settlements and hands the result
//! to the backend cascade that pays cycles and wallets.
//!
//! ## Flow:
//! 1. Admin opens a locked group (locked → settling)
//! 2. Admin enters results, saving progress as often as needed
//! 3. Lock Results: fixtures persisted, variants graded, group settled
//! 4. Cascade RPC updates dependent cycles and wallets
//! 5. A failed cascade leaves the group settled; `repair` re-runs it
//!
//! ## Pieces:
//! - `tiers`: tier tables and payout resolution
//! - `tally`: correct-pick counting
//! - `flow`:  the settling state machine over the store

pub mod flow;
pub mod tally;
pub mod tiers;

pub use flow::{SettlementOutcome, SettlementPreview, SettlementReport, SettlementService, SettlingSnapshot, VariantGrade};
pub use tally::{missing_results, tally_correct, CorrectTally};
pub use tiers::{compute_tier_and_payout, Tier, TierEntry, TierError, TierPolicy, TierResolution, TierTable};

use uuid::Uuid;

use crate::domain::GroupStatus;
use crate::store::StoreError;

/// Result type for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Settlement errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettlementError {
    #[error("Jackpot group not found: {0}")]
    GroupNotFound(Uuid),

    #[error("Invalid group transition: {from} -> {to}")]
    InvalidTransition { from: GroupStatus, to: GroupStatus },

    #[error("{count} finished fixture(s) have no result")]
    MissingResults { count: usize },

    #[error("Fixture {0} does not belong to this group")]
    UnknownFixture(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}
