//! Settling state machine (`/admin/settling`)

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::tally::{missing_results, tally_correct};
use super::tiers::{TierPolicy, TierTable};
use super::{SettlementError, SettlementResult};
use crate::domain::*;
use crate::store::{CascadeSummary, JackpotStore};

/// Everything the settling screen shows for one group
#[derive(Debug, Clone, Serialize)]
pub struct SettlingSnapshot {
    pub group: JackpotGroup,
    pub fixtures: Vec<Fixture>,
    pub variants: Vec<Variant>,
    pub settlements: Vec<VariantSettlement>,
}

/// One variant's grade, before it is persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantGrade {
    pub variant_id: Uuid,
    pub label: VariantLabel,
    pub correct_count: u32,
    pub tier_hit: Option<String>,
    pub payout_estimated: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementPreview {
    pub group_id: Uuid,
    /// Finished fixtures still waiting for a result; locking needs this at 0
    pub missing_results: usize,
    pub grades: Vec<VariantGrade>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub group_id: Uuid,
    pub fixtures_saved: usize,
    pub settlements: Vec<VariantSettlement>,
}

/// How a lock (or repair) ended. Steps before the cascade are never rolled back.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Settled {
        report: SettlementReport,
        cascade: CascadeSummary,
    },
    SettledWithCascadeFailure {
        report: SettlementReport,
        reason: String,
    },
}

impl SettlementOutcome {
    pub fn report(&self) -> &SettlementReport {
        match self {
            SettlementOutcome::Settled { report, .. } => report,
            SettlementOutcome::SettledWithCascadeFailure { report, .. } => report,
        }
    }

    pub fn cascade_failed(&self) -> bool {
        matches!(self, SettlementOutcome::SettledWithCascadeFailure { .. })
    }
}

#[derive(Clone)]
pub struct SettlementService {
    store: Arc<dyn JackpotStore>,
    policy: TierPolicy,
}

impl SettlementService {
    pub fn new(store: Arc<dyn JackpotStore>, policy: TierPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> TierPolicy {
        self.policy
    }

    pub async fn summary(&self, group_id: Uuid) -> SettlementResult<SettlingSnapshot> {
        let group = self.load_group(group_id).await?;
        let fixtures = self.store.list_fixtures(group_id).await?;
        let variants = self.store.list_variants(group_id).await?;
        let settlements = self.store.list_settlements(group_id).await?;
        Ok(SettlingSnapshot { group, fixtures, variants, settlements })
    }

    /// First admin interaction: locked → settling. Re-opening is a no-op.
    pub async fn open(&self, group_id: Uuid) -> SettlementResult<JackpotGroup> {
        let mut group = self.load_group(group_id).await?;
        self.begin_settling(&mut group).await?;
        Ok(group)
    }

    /// Persist partial results without grading anything
    pub async fn save_progress(&self, group_id: Uuid, updates: &[FixtureUpdate]) -> SettlementResult<Vec<Fixture>> {
        let mut group = self.load_group(group_id).await?;
        self.begin_settling(&mut group).await?;

        let mut fixtures = self.store.list_fixtures(group_id).await?;
        let changed = apply_updates(&mut fixtures, updates)?;
        let touched: Vec<Fixture> = fixtures
            .iter()
            .filter(|f| changed.contains(&f.id))
            .cloned()
            .collect();
        self.store.upsert_fixtures(&touched).await?;

        info!("💾 Saved {} fixture(s) for group {}", touched.len(), group_id);
        Ok(fixtures)
    }

    /// Grade with the pending edits applied, persisting nothing
    pub async fn preview(&self, group_id: Uuid, updates: &[FixtureUpdate]) -> SettlementResult<SettlementPreview> {
        let group = self.load_group(group_id).await?;
        let mut fixtures = self.store.list_fixtures(group_id).await?;
        apply_updates(&mut fixtures, updates)?;

        let grades = self.grade(&group, &fixtures).await?;
        Ok(SettlementPreview {
            group_id,
            missing_results: missing_results(&fixtures),
            grades,
        })
    }

    /// Lock Results: persist fixtures, grade, settle, cascade
    pub async fn lock_results(
        &self,
        group_id: Uuid,
        updates: &[FixtureUpdate],
        settled_by: &str,
    ) -> SettlementResult<SettlementOutcome> {
        let mut group = self.load_group(group_id).await?;
        if !matches!(group.status, GroupStatus::Locked | GroupStatus::Settling) {
            return Err(SettlementError::InvalidTransition {
                from: group.status,
                to: GroupStatus::Settled,
            });
        }

        let mut fixtures = self.store.list_fixtures(group_id).await?;
        apply_updates(&mut fixtures, updates)?;

        let missing = missing_results(&fixtures);
        if missing > 0 {
            warn!("⛔ Lock refused for group {}: {} finished fixture(s) without result", group_id, missing);
            return Err(SettlementError::MissingResults { count: missing });
        }

        self.begin_settling(&mut group).await?;

        // 1. Fixtures
        self.store.upsert_fixtures(&fixtures).await?;

        // 2. Settlements
        let grades = self.grade(&group, &fixtures).await?;
        let settlements = self.persist_grades(&group, &grades, settled_by).await?;

        // 3. Group status
        self.store.update_group_status(group_id, GroupStatus::Settled).await?;
        info!(
            "🔒 Group {} settled by {} ({} variant(s))",
            group_id,
            settled_by,
            settlements.len()
        );

        let report = SettlementReport {
            group_id,
            fixtures_saved: fixtures.len(),
            settlements,
        };

        // 4. Cascade
        Ok(self.cascade(report).await)
    }

    /// Re-derive settlements for a settled group and re-run the cascade.
    /// Safe to repeat: settlement rows are upserted per variant.
    pub async fn repair(&self, group_id: Uuid, settled_by: &str) -> SettlementResult<SettlementOutcome> {
        let group = self.load_group(group_id).await?;
        if group.status != GroupStatus::Settled {
            return Err(SettlementError::InvalidTransition {
                from: group.status,
                to: GroupStatus::Settled,
            });
        }

        let fixtures = self.store.list_fixtures(group_id).await?;
        let grades = self.grade(&group, &fixtures).await?;
        let settlements = self.persist_grades(&group, &grades, settled_by).await?;
        info!("🔧 Repairing cascade for group {}", group_id);

        let report = SettlementReport {
            group_id,
            fixtures_saved: 0,
            settlements,
        };
        Ok(self.cascade(report).await)
    }

    async fn load_group(&self, group_id: Uuid) -> SettlementResult<JackpotGroup> {
        self.store
            .get_group(group_id)
            .await?
            .ok_or(SettlementError::GroupNotFound(group_id))
    }

    async fn begin_settling(&self, group: &mut JackpotGroup) -> SettlementResult<()> {
        match group.status {
            GroupStatus::Settling => Ok(()),
            GroupStatus::Locked => {
                self.store.update_group_status(group.id, GroupStatus::Settling).await?;
                info!("📝 Group {} moved to settling", group.id);
                group.status = GroupStatus::Settling;
                Ok(())
            }
            other => Err(SettlementError::InvalidTransition {
                from: other,
                to: GroupStatus::Settling,
            }),
        }
    }

    async fn tier_table(&self, group: &JackpotGroup) -> SettlementResult<TierTable> {
        match self.store.get_payout_rule(&group.site, &group.jackpot_type).await? {
            Some(table) => Ok(table),
            None => {
                warn!(
                    "⚠️ No payout rule for {}/{}; grading without tiers",
                    group.site, group.jackpot_type
                );
                Ok(TierTable::default())
            }
        }
    }

    async fn grade(&self, group: &JackpotGroup, fixtures: &[Fixture]) -> SettlementResult<Vec<VariantGrade>> {
        let variants = self.store.list_variants(group.id).await?;
        let variant_ids: Vec<Uuid> = variants.iter().map(|v| v.id).collect();
        let predictions = self.store.list_predictions(&variant_ids).await?;
        let tiers = self.tier_table(group).await?;

        let tally = tally_correct(&variants, fixtures, &predictions);
        let grades = variants
            .iter()
            .map(|variant| {
                let correct_count = tally.get(&variant.id).copied().unwrap_or(0);
                let resolution = tiers.resolve(correct_count, group.prize_pool, self.policy);
                VariantGrade {
                    variant_id: variant.id,
                    label: variant.label,
                    correct_count,
                    tier_hit: resolution.tier_hit,
                    payout_estimated: resolution.payout_estimated,
                }
            })
            .collect::<Vec<_>>();

        debug!("Graded group {}: {:?}", group.id, grades);
        Ok(grades)
    }

    /// Upsert one settlement per grade, keeping any payout_actual and the
    /// original settled_at/settled_by already on record
    async fn persist_grades(
        &self,
        group: &JackpotGroup,
        grades: &[VariantGrade],
        settled_by: &str,
    ) -> SettlementResult<Vec<VariantSettlement>> {
        let existing: HashMap<Uuid, VariantSettlement> = self
            .store
            .list_settlements(group.id)
            .await?
            .into_iter()
            .map(|s| (s.variant_id, s))
            .collect();

        let now = Utc::now();
        let settlements: Vec<VariantSettlement> = grades
            .iter()
            .map(|grade| {
                let previous = existing.get(&grade.variant_id);
                VariantSettlement {
                    variant_id: grade.variant_id,
                    group_id: group.id,
                    correct_count: grade.correct_count,
                    tier_hit: grade.tier_hit.clone(),
                    payout_estimated: grade.payout_estimated,
                    payout_actual: previous.and_then(|p| p.payout_actual),
                    settled_at: previous.map(|p| p.settled_at).unwrap_or(now),
                    settled_by: previous
                        .map(|p| p.settled_by.clone())
                        .unwrap_or_else(|| settled_by.to_string()),
                }
            })
            .collect();

        self.store.upsert_settlements(&settlements).await?;
        Ok(settlements)
    }

    async fn cascade(&self, report: SettlementReport) -> SettlementOutcome {
        match self.store.cascade_group_settlement(report.group_id).await {
            Ok(cascade) => {
                info!(
                    "🌊 Cascade for group {}: {} cycle(s) updated, {} won",
                    report.group_id, cascade.cycles_updated, cascade.cycles_won_now
                );
                SettlementOutcome::Settled { report, cascade }
            }
            Err(e) => {
                warn!("⚠️ Group {} settled but cascade failed: {}", report.group_id, e);
                SettlementOutcome::SettledWithCascadeFailure {
                    report,
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Apply admin edits in place; returns the ids that were edited
fn apply_updates(fixtures: &mut [Fixture], updates: &[FixtureUpdate]) -> SettlementResult<Vec<Uuid>> {
    let mut changed = Vec::with_capacity(updates.len());
    for update in updates {
        let fixture = fixtures
            .iter_mut()
            .find(|f| f.id == update.fixture_id)
            .ok_or(SettlementError::UnknownFixture(update.fixture_id))?;
        update.apply(fixture);
        changed.push(fixture.id);
    }
    Ok(changed)
}
