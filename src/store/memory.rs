//! In-process store: the same contract as the hosted backend, held in RAM.
//!
//! Tables sit behind one `parking_lot::RwLock`; wallets live in a `DashMap`
//! so a credit adjustment is a single entry-locked read-modify-write.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{CascadeSummary, JackpotStore, StoreError, StoreResult};
use crate::domain::*;
use crate::settlement::TierTable;

#[derive(Debug, Default)]
struct Tables {
    groups: HashMap<Uuid, JackpotGroup>,
    fixtures: HashMap<Uuid, Fixture>,
    variants: HashMap<Uuid, Variant>,
    predictions: HashMap<Uuid, Prediction>,
    settlements: HashMap<Uuid, VariantSettlement>, // variant_id -> row
    payout_rules: HashMap<(String, String), TierTable>,
    cycles: HashMap<Uuid, Cycle>,
    subscriptions: HashMap<(Uuid, Uuid), CycleSubscription>, // (cycle, user)
    participants: HashMap<Uuid, Participant>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    wallets: DashMap<Uuid, i64>,
    fail_cascade: AtomicBool,
    fail_subscriptions: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `cascade_group_settlement` fail until switched back
    pub fn set_cascade_failure(&self, fail: bool) {
        self.fail_cascade.store(fail, Ordering::SeqCst);
    }

    /// Make `claim_subscription` fail until switched back
    pub fn set_subscription_failure(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    // Seeding helpers for rows this service never creates itself

    pub fn put_cycle(&self, cycle: Cycle) {
        self.tables.write().cycles.insert(cycle.id, cycle);
    }

    pub fn put_participant(&self, participant: Participant) {
        self.tables.write().participants.insert(participant.id, participant);
    }

    pub fn put_profile(&self, user_id: Uuid, credits: i64) {
        self.wallets.insert(user_id, credits);
    }

    pub fn credits(&self, user_id: Uuid) -> Option<i64> {
        self.wallets.get(&user_id).map(|c| *c)
    }

    pub fn participant(&self, id: Uuid) -> Option<Participant> {
        self.tables.read().participants.get(&id).cloned()
    }

    pub fn cycle(&self, id: Uuid) -> Option<Cycle> {
        self.tables.read().cycles.get(&id).cloned()
    }
}

#[async_trait]
impl JackpotStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_group(&self, id: Uuid) -> StoreResult<Option<JackpotGroup>> {
        Ok(self.tables.read().groups.get(&id).cloned())
    }

    async fn insert_group(&self, group: &JackpotGroup) -> StoreResult<()> {
        self.tables.write().groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn update_group_status(&self, id: Uuid, status: GroupStatus) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let group = tables
            .groups
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("jackpot_group", id))?;
        group.status = status;
        Ok(())
    }

    async fn list_fixtures(&self, group_id: Uuid) -> StoreResult<Vec<Fixture>> {
        let mut fixtures: Vec<Fixture> = self
            .tables
            .read()
            .fixtures
            .values()
            .filter(|f| f.group_id == group_id)
            .cloned()
            .collect();
        fixtures.sort_by_key(|f| f.seq);
        Ok(fixtures)
    }

    async fn insert_fixtures(&self, fixtures: &[Fixture]) -> StoreResult<()> {
        let mut tables = self.tables.write();
        for fixture in fixtures {
            tables.fixtures.insert(fixture.id, fixture.clone());
        }
        Ok(())
    }

    async fn upsert_fixtures(&self, fixtures: &[Fixture]) -> StoreResult<()> {
        self.insert_fixtures(fixtures).await
    }

    async fn list_variants(&self, group_id: Uuid) -> StoreResult<Vec<Variant>> {
        let mut variants: Vec<Variant> = self
            .tables
            .read()
            .variants
            .values()
            .filter(|v| v.group_id == group_id)
            .cloned()
            .collect();
        variants.sort_by_key(|v| v.label);
        Ok(variants)
    }

    async fn insert_variants(&self, variants: &[Variant]) -> StoreResult<()> {
        let mut tables = self.tables.write();
        for variant in variants {
            tables.variants.insert(variant.id, variant.clone());
        }
        Ok(())
    }

    async fn list_predictions(&self, variant_ids: &[Uuid]) -> StoreResult<Vec<Prediction>> {
        Ok(self
            .tables
            .read()
            .predictions
            .values()
            .filter(|p| variant_ids.contains(&p.variant_id))
            .cloned()
            .collect())
    }

    async fn insert_predictions(&self, predictions: &[Prediction]) -> StoreResult<()> {
        let mut tables = self.tables.write();
        for prediction in predictions {
            tables.predictions.insert(prediction.id, prediction.clone());
        }
        Ok(())
    }

    async fn list_settlements(&self, group_id: Uuid) -> StoreResult<Vec<VariantSettlement>> {
        Ok(self
            .tables
            .read()
            .settlements
            .values()
            .filter(|s| s.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn upsert_settlements(&self, settlements: &[VariantSettlement]) -> StoreResult<()> {
        let mut tables = self.tables.write();
        for settlement in settlements {
            tables.settlements.insert(settlement.variant_id, settlement.clone());
        }
        Ok(())
    }

    async fn get_payout_rule(&self, site: &str, jackpot_type: &str) -> StoreResult<Option<TierTable>> {
        let key = (site.to_string(), jackpot_type.to_string());
        Ok(self.tables.read().payout_rules.get(&key).cloned())
    }

    async fn upsert_payout_rule(&self, site: &str, jackpot_type: &str, tiers: &TierTable) -> StoreResult<()> {
        let key = (site.to_string(), jackpot_type.to_string());
        self.tables.write().payout_rules.insert(key, tiers.clone());
        Ok(())
    }

    async fn get_cycle(&self, id: Uuid) -> StoreResult<Option<Cycle>> {
        Ok(self.tables.read().cycles.get(&id).cloned())
    }

    async fn record_cycle_result(&self, id: Uuid, status: CycleStatus, winning_platform: Option<&str>) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let cycle = tables
            .cycles
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("cycle", id))?;
        cycle.status = status;
        cycle.winning_platform = winning_platform.map(str::to_string);
        Ok(())
    }

    async fn list_cycle_groups(&self, cycle_id: Uuid) -> StoreResult<Vec<JackpotGroup>> {
        let tables = self.tables.read();
        let cycle = tables
            .cycles
            .get(&cycle_id)
            .ok_or_else(|| StoreError::not_found("cycle", cycle_id))?;
        Ok(cycle
            .group_ids
            .iter()
            .filter_map(|id| tables.groups.get(id).cloned())
            .collect())
    }

    async fn get_subscription(&self, cycle_id: Uuid, user_id: Uuid) -> StoreResult<Option<CycleSubscription>> {
        Ok(self.tables.read().subscriptions.get(&(cycle_id, user_id)).cloned())
    }

    async fn claim_subscription(&self, subscription: &CycleSubscription) -> StoreResult<bool> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("cycle_subscriptions unavailable".into()));
        }
        let mut tables = self.tables.write();
        match tables.subscriptions.entry((subscription.cycle_id, subscription.user_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(subscription.clone());
                Ok(true)
            }
        }
    }

    async fn release_subscription(&self, cycle_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.tables.write().subscriptions.remove(&(cycle_id, user_id));
        Ok(())
    }

    async fn list_participants(&self, cycle_id: Uuid) -> StoreResult<Vec<Participant>> {
        Ok(self
            .tables
            .read()
            .participants
            .values()
            .filter(|p| p.cycle_id == cycle_id)
            .cloned()
            .collect())
    }

    async fn update_participant(&self, participant: &Participant) -> StoreResult<()> {
        let mut tables = self.tables.write();
        match tables.participants.get_mut(&participant.id) {
            Some(row) => {
                *row = participant.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("participant", participant.id)),
        }
    }

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.wallets.get(&user_id).map(|credits| Profile { user_id, credits: *credits }))
    }

    async fn adjust_credits(&self, user_id: Uuid, delta: i64) -> StoreResult<i64> {
        let mut balance = self
            .wallets
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("profile", user_id))?;
        let next = *balance + delta;
        if next < 0 {
            return Err(StoreError::InsufficientCredits {
                required: -delta,
                available: *balance,
            });
        }
        *balance = next;
        Ok(next)
    }

    async fn cascade_group_settlement(&self, group_id: Uuid) -> StoreResult<CascadeSummary> {
        if self.fail_cascade.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("settle_group_and_update_cycles timed out".into()));
        }

        let mut tables = self.tables.write();
        let hit = tables
            .settlements
            .values()
            .any(|s| s.group_id == group_id && s.tier_hit.is_some());

        let mut summary = CascadeSummary::default();
        for cycle in tables.cycles.values_mut() {
            if cycle.status.is_terminal() || !cycle.group_ids.contains(&group_id) {
                continue;
            }
            summary.cycles_updated += 1;
            if hit {
                cycle.status = CycleStatus::Won;
                summary.cycles_won_now += 1;
            }
        }
        Ok(summary)
    }
}
