//! Legacy cycle schema: cycles, participants, subscriptions, wallets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bundle marker meaning "every platform in the cycle"
pub const ALL_SITES: &str = "ALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Waiting,
    Active,
    Won,
    Success,
    Failed,
    Expired,
    Archived,
}

impl CycleStatus {
    /// Cycles in these states can no longer be joined
    pub fn is_closed(&self) -> bool {
        matches!(self, CycleStatus::Won | CycleStatus::Expired | CycleStatus::Archived)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CycleStatus::Won | CycleStatus::Success | CycleStatus::Failed | CycleStatus::Expired | CycleStatus::Archived
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: Uuid,
    pub status: CycleStatus,
    pub credit_cost: i64,
    pub max_end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub group_ids: Vec<Uuid>,
    /// Set by the legacy settle; `None` while open or when the cycle failed
    #[serde(default)]
    pub winning_platform: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalOutcome {
    Pending,
    Won,
    Lost,
    MissedOpportunity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub user_id: Uuid,
    pub sites_selected: Vec<String>,
    pub personal_outcome: PersonalOutcome,
    pub rollover_credit: bool,
}

impl Participant {
    pub fn has_bundle(&self) -> bool {
        self.sites_selected.iter().any(|s| s == ALL_SITES)
    }

    pub fn selected(&self, site: &str) -> bool {
        self.sites_selected.iter().any(|s| s == site)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSubscription {
    pub cycle_id: Uuid,
    pub user_id: Uuid,
    pub credits_paid: i64,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub credits: i64,
}
