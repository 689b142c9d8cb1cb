//! Legacy cycle path: joining with credits, grading participants.
//!
//! Every wallet change is a single `adjust_credits` call against the store,
//! which applies the delta atomically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::*;
use crate::store::{JackpotStore, StoreError};

/// Rollover credits granted for a missed opportunity
pub const ROLLOVER_CREDITS: i64 = 1;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CycleError {
    #[error("Cycle not found: {0}")]
    CycleNotFound(Uuid),

    #[error("Cycle is {0:?} and can no longer be joined")]
    Closed(CycleStatus),

    #[error("Cycle ended at {0}")]
    Ended(DateTime<Utc>),

    #[error("Cycle has no group still open for predictions")]
    NotJoinable,

    #[error("Insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Cycle is already {0:?}")]
    AlreadySettled(CycleStatus),

    #[error("Cycle was already settled as {status:?} with winning platform {winning_platform:?}")]
    ResultMismatch {
        status: CycleStatus,
        winning_platform: Option<String>,
    },

    #[error("Cycle has an invalid credit cost: {0}")]
    InvalidCost(i64),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientCredits { required, available } => {
                CycleError::InsufficientCredits { required, available }
            }
            other => CycleError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinReceipt {
    pub cycle_id: Uuid,
    pub user_id: Uuid,
    pub credits_paid: i64,
    /// True when the user already held a subscription and nothing was charged
    pub already_joined: bool,
    pub credits_remaining: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleSettlement {
    pub cycle_id: Uuid,
    pub status: Option<CycleStatus>,
    pub won: u32,
    pub lost: u32,
    pub missed_opportunity: u32,
    pub skipped: u32,
    pub rollover_failures: u32,
}

/// Outcome for one participant given the cycle's winning platform
pub fn classify_participant(participant: &Participant, winning_platform: Option<&str>) -> PersonalOutcome {
    match winning_platform {
        None => PersonalOutcome::Lost,
        Some(platform) if participant.has_bundle() || participant.selected(platform) => PersonalOutcome::Won,
        Some(_) => PersonalOutcome::MissedOpportunity,
    }
}

#[derive(Clone)]
pub struct CycleService {
    store: Arc<dyn JackpotStore>,
}

impl CycleService {
    pub fn new(store: Arc<dyn JackpotStore>) -> Self {
        Self { store }
    }

    /// Spend `credit_cost` to join a cycle.
    ///
    /// The subscription row is claimed before any credits move, so two
    /// concurrent joins by the same user charge at most once.
    pub async fn join_cycle(&self, user_id: Uuid, cycle_id: Uuid, now: DateTime<Utc>) -> Result<JoinReceipt, CycleError> {
        let cycle = self
            .store
            .get_cycle(cycle_id)
            .await?
            .ok_or(CycleError::CycleNotFound(cycle_id))?;

        self.ensure_joinable(&cycle, now).await?;

        if let Some(existing) = self.store.get_subscription(cycle_id, user_id).await? {
            info!("↩️ User {} already joined cycle {}", user_id, cycle_id);
            return Ok(already_joined(&existing));
        }

        let subscription = CycleSubscription {
            cycle_id,
            user_id,
            credits_paid: cycle.credit_cost,
            joined_at: now,
        };
        if !self.store.claim_subscription(&subscription).await? {
            info!("↩️ Concurrent join for {} on {} lost the claim", user_id, cycle_id);
            let existing = self.store.get_subscription(cycle_id, user_id).await?;
            return Ok(already_joined(existing.as_ref().unwrap_or(&subscription)));
        }

        let remaining = match self.store.adjust_credits(user_id, -cycle.credit_cost).await {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!("⚠️ Debit for {} on {} failed: {}; releasing subscription", user_id, cycle_id, e);
                if let Err(release_err) = self.store.release_subscription(cycle_id, user_id).await {
                    error!(
                        "❌ Could not release subscription {}/{}: {}",
                        cycle_id, user_id, release_err
                    );
                }
                return Err(e.into());
            }
        };

        info!("🎟️ User {} joined cycle {} for {} credit(s)", user_id, cycle_id, cycle.credit_cost);
        Ok(JoinReceipt {
            cycle_id,
            user_id,
            credits_paid: cycle.credit_cost,
            already_joined: false,
            credits_remaining: Some(remaining),
        })
    }

    async fn ensure_joinable(&self, cycle: &Cycle, now: DateTime<Utc>) -> Result<(), CycleError> {
        if cycle.credit_cost <= 0 {
            return Err(CycleError::InvalidCost(cycle.credit_cost));
        }
        if cycle.status.is_closed() {
            return Err(CycleError::Closed(cycle.status));
        }
        if let Some(end) = cycle.max_end_at {
            if end < now {
                return Err(CycleError::Ended(end));
            }
        }
        if cycle.status == CycleStatus::Waiting {
            return Ok(());
        }
        let groups = self.store.list_cycle_groups(cycle.id).await?;
        let open = groups
            .iter()
            .any(|g| g.lock_time.map(|lock| lock > now).unwrap_or(false));
        if open {
            Ok(())
        } else {
            Err(CycleError::NotJoinable)
        }
    }

    /// Grade participants against the winning platform.
    /// `None` means the cycle failed for everyone.
    ///
    /// Re-running with the same result finishes anyone still owed a grade or
    /// a rollover credit; a different result is refused.
    pub async fn settle_cycle(&self, cycle_id: Uuid, winning_platform: Option<&str>) -> Result<CycleSettlement, CycleError> {
        let cycle = self
            .store
            .get_cycle(cycle_id)
            .await?
            .ok_or(CycleError::CycleNotFound(cycle_id))?;

        let winning_platform = winning_platform.map(str::trim).filter(|p| !p.is_empty());
        let status = if winning_platform.is_some() {
            CycleStatus::Success
        } else {
            CycleStatus::Failed
        };

        match cycle.status {
            CycleStatus::Archived | CycleStatus::Expired | CycleStatus::Won => {
                return Err(CycleError::AlreadySettled(cycle.status));
            }
            CycleStatus::Success | CycleStatus::Failed => {
                if cycle.status != status || cycle.winning_platform.as_deref() != winning_platform {
                    warn!("⛔ Cycle {} already settled as {:?}", cycle_id, cycle.status);
                    return Err(CycleError::ResultMismatch {
                        status: cycle.status,
                        winning_platform: cycle.winning_platform.clone(),
                    });
                }
                info!("🔁 Re-running settlement for cycle {}", cycle_id);
            }
            CycleStatus::Waiting | CycleStatus::Active => {
                self.store
                    .record_cycle_result(cycle_id, status, winning_platform)
                    .await?;
            }
        }

        let mut summary = CycleSettlement {
            cycle_id,
            status: Some(status),
            ..Default::default()
        };

        for mut participant in self.store.list_participants(cycle_id).await? {
            let outcome = match participant.personal_outcome {
                PersonalOutcome::Pending => classify_participant(&participant, winning_platform),
                // Graded by an earlier run whose credit grant never landed
                PersonalOutcome::MissedOpportunity if !participant.rollover_credit => {
                    PersonalOutcome::MissedOpportunity
                }
                _ => {
                    summary.skipped += 1;
                    continue;
                }
            };

            if outcome == PersonalOutcome::MissedOpportunity {
                if let Err(e) = self.store.adjust_credits(participant.user_id, ROLLOVER_CREDITS).await {
                    error!("❌ Rollover credit for {} failed: {}; left for the next run", participant.user_id, e);
                    summary.rollover_failures += 1;
                    continue;
                }
                participant.rollover_credit = true;
            }

            participant.personal_outcome = outcome;
            self.store.update_participant(&participant).await?;

            match outcome {
                PersonalOutcome::Won => summary.won += 1,
                PersonalOutcome::Lost => summary.lost += 1,
                PersonalOutcome::MissedOpportunity => summary.missed_opportunity += 1,
                PersonalOutcome::Pending => {}
            }
        }

        info!(
            "🏁 Cycle {} settled as {:?}: {} won, {} missed, {} lost",
            cycle_id, status, summary.won, summary.missed_opportunity, summary.lost
        );
        Ok(summary)
    }
}

fn already_joined(subscription: &CycleSubscription) -> JoinReceipt {
    JoinReceipt {
        cycle_id: subscription.cycle_id,
        user_id: subscription.user_id,
        credits_paid: subscription.credits_paid,
        already_joined: true,
        credits_remaining: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(sites: &[&str]) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            cycle_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            sites_selected: sites.iter().map(|s| s.to_string()).collect(),
            personal_outcome: PersonalOutcome::Pending,
            rollover_credit: false,
        }
    }

    #[test]
    fn test_bundle_always_wins() {
        let bundle = participant(&[ALL_SITES]);
        for platform in ["sportpesa", "betika", "mozzart"] {
            assert_eq!(classify_participant(&bundle, Some(platform)), PersonalOutcome::Won);
        }
    }

    #[test]
    fn test_wrong_pick_is_missed_opportunity() {
        let p = participant(&["betika"]);
        assert_eq!(classify_participant(&p, Some("betika")), PersonalOutcome::Won);
        assert_eq!(classify_participant(&p, Some("sportpesa")), PersonalOutcome::MissedOpportunity);
    }

    #[test]
    fn test_failed_cycle_is_lost_for_everyone() {
        assert_eq!(classify_participant(&participant(&[ALL_SITES]), None), PersonalOutcome::Lost);
        assert_eq!(classify_participant(&participant(&["betika"]), None), PersonalOutcome::Lost);
    }
}
