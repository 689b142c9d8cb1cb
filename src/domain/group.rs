//! Jackpot groups and everything graded inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Pick;

/// Lifecycle of a jackpot group
///
/// draft → active → locked → settling → settled, archived from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Draft,
    Active,
    Locked,
    Settling,
    Settled,
    Archived,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Draft => "draft",
            GroupStatus::Active => "active",
            GroupStatus::Locked => "locked",
            GroupStatus::Settling => "settling",
            GroupStatus::Settled => "settled",
            GroupStatus::Archived => "archived",
        }
    }

    pub fn can_transition_to(&self, next: GroupStatus) -> bool {
        use GroupStatus::*;
        match (self, next) {
            (Archived, _) => false,
            (_, Archived) => true,
            (Draft, Active) | (Active, Locked) | (Locked, Settling) | (Settling, Settled) => true,
            // Reopening the settling screen is not a transition
            (Settling, Settling) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bundle of fixtures from one site/jackpot type, sold and settled together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JackpotGroup {
    pub id: Uuid,
    pub site: String,
    pub jackpot_type: String,
    pub status: GroupStatus,
    pub lock_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub prize_pool: Option<f64>,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureStatus {
    Scheduled,
    Finished,
    Void,
    Postponed,
    Abandoned,
}

/// One match within a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: Uuid,
    pub group_id: Uuid,
    pub seq: u32,
    pub home_team: String,
    pub away_team: String,
    pub kickoff_time: Option<DateTime<Utc>>,
    pub status: FixtureStatus,
    pub result: Option<Pick>,
    pub final_score: Option<String>,
}

impl Fixture {
    /// The result that grades predictions, if any. Only finished fixtures have one.
    pub fn graded_result(&self) -> Option<Pick> {
        match self.status {
            FixtureStatus::Finished => self.result,
            _ => None,
        }
    }

    /// Finished but nobody has entered the result yet
    pub fn is_missing_result(&self) -> bool {
        self.status == FixtureStatus::Finished && self.result.is_none()
    }
}

/// Admin edit of a fixture during settling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureUpdate {
    pub fixture_id: Uuid,
    pub status: FixtureStatus,
    #[serde(default)]
    pub result: Option<Pick>,
    #[serde(default)]
    pub final_score: Option<String>,
}

impl FixtureUpdate {
    pub fn apply(&self, fixture: &mut Fixture) {
        fixture.status = self.status;
        fixture.result = self.result;
        fixture.final_score = self.final_score.clone();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariantLabel {
    A,
    B,
}

/// A named prediction strategy attached to a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub group_id: Uuid,
    pub label: VariantLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub fixture_id: Uuid,
    pub pick: Pick,
}

/// Grading output, one row per variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSettlement {
    pub variant_id: Uuid,
    pub group_id: Uuid,
    pub correct_count: u32,
    pub tier_hit: Option<String>,
    pub payout_estimated: Option<f64>,
    pub payout_actual: Option<f64>,
    pub settled_at: DateTime<Utc>,
    pub settled_by: String,
}
