//! Hosted backend: PostgREST tables plus two RPCs.
//!
//! - `adjust_credits(p_user_id, p_delta)`: `UPDATE profiles SET credits =
//!   credits + p_delta` under a row lock, raising `insufficient_credits`
//!   rather than going negative; returns the new balance.
//! - `settle_group_and_update_cycles(p_group_id)`: cascades a settled group
//!   into cycles and wallets; returns `{cycles_updated, cycles_won_now}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{CascadeSummary, JackpotStore, StoreError, StoreResult};
use crate::domain::*;
use crate::settlement::TierTable;
use crate::supabase::{eq, in_list, SupabaseManager};

#[derive(Serialize, Deserialize)]
struct PayoutRuleRow {
    site: String,
    jackpot_type: String,
    tiers: TierTable,
}

#[derive(Deserialize)]
struct ProfileRow {
    id: Uuid,
    credits: i64,
}

#[derive(Clone)]
pub struct SupabaseStore {
    supabase: SupabaseManager,
}

impl SupabaseStore {
    pub fn new(supabase: SupabaseManager) -> Self {
        Self { supabase }
    }

    async fn patch_one(&self, table: &'static str, id: Uuid, patch: Value) -> StoreResult<()> {
        let touched = self.supabase.update(table, &[("id", eq(id))], &patch).await?;
        if touched == 0 {
            return Err(StoreError::not_found(table, id));
        }
        Ok(())
    }
}

#[async_trait]
impl JackpotStore for SupabaseStore {
    fn backend_name(&self) -> &'static str {
        "supabase"
    }

    async fn get_group(&self, id: Uuid) -> StoreResult<Option<JackpotGroup>> {
        self.supabase.select_one("jackpot_groups", &[("id", eq(id))]).await
    }

    async fn insert_group(&self, group: &JackpotGroup) -> StoreResult<()> {
        self.supabase.insert("jackpot_groups", std::slice::from_ref(group)).await
    }

    async fn update_group_status(&self, id: Uuid, status: GroupStatus) -> StoreResult<()> {
        self.patch_one("jackpot_groups", id, json!({ "status": status })).await
    }

    async fn list_fixtures(&self, group_id: Uuid) -> StoreResult<Vec<Fixture>> {
        self.supabase
            .select("fixtures", &[("group_id", eq(group_id)), ("order", "seq.asc".to_string())])
            .await
    }

    async fn insert_fixtures(&self, fixtures: &[Fixture]) -> StoreResult<()> {
        self.supabase.insert("fixtures", fixtures).await
    }

    async fn upsert_fixtures(&self, fixtures: &[Fixture]) -> StoreResult<()> {
        self.supabase.upsert("fixtures", fixtures, "id").await
    }

    async fn list_variants(&self, group_id: Uuid) -> StoreResult<Vec<Variant>> {
        self.supabase
            .select("jackpot_variants", &[("group_id", eq(group_id)), ("order", "label.asc".to_string())])
            .await
    }

    async fn insert_variants(&self, variants: &[Variant]) -> StoreResult<()> {
        self.supabase.insert("jackpot_variants", variants).await
    }

    async fn list_predictions(&self, variant_ids: &[Uuid]) -> StoreResult<Vec<Prediction>> {
        if variant_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.supabase
            .select("predictions", &[("variant_id", in_list(variant_ids))])
            .await
    }

    async fn insert_predictions(&self, predictions: &[Prediction]) -> StoreResult<()> {
        self.supabase.insert("predictions", predictions).await
    }

    async fn list_settlements(&self, group_id: Uuid) -> StoreResult<Vec<VariantSettlement>> {
        self.supabase
            .select("variant_settlements", &[("group_id", eq(group_id))])
            .await
    }

    async fn upsert_settlements(&self, settlements: &[VariantSettlement]) -> StoreResult<()> {
        self.supabase
            .upsert("variant_settlements", settlements, "variant_id")
            .await
    }

    async fn get_payout_rule(&self, site: &str, jackpot_type: &str) -> StoreResult<Option<TierTable>> {
        let row: Option<PayoutRuleRow> = self
            .supabase
            .select_one("payout_rules", &[("site", eq(site)), ("jackpot_type", eq(jackpot_type))])
            .await?;
        Ok(row.map(|r| r.tiers))
    }

    async fn upsert_payout_rule(&self, site: &str, jackpot_type: &str, tiers: &TierTable) -> StoreResult<()> {
        let row = PayoutRuleRow {
            site: site.to_string(),
            jackpot_type: jackpot_type.to_string(),
            tiers: tiers.clone(),
        };
        self.supabase
            .upsert("payout_rules", std::slice::from_ref(&row), "site,jackpot_type")
            .await
    }

    async fn get_cycle(&self, id: Uuid) -> StoreResult<Option<Cycle>> {
        self.supabase.select_one("cycles", &[("id", eq(id))]).await
    }

    async fn record_cycle_result(&self, id: Uuid, status: CycleStatus, winning_platform: Option<&str>) -> StoreResult<()> {
        self.patch_one(
            "cycles",
            id,
            json!({ "status": status, "winning_platform": winning_platform }),
        )
        .await
    }

    async fn list_cycle_groups(&self, cycle_id: Uuid) -> StoreResult<Vec<JackpotGroup>> {
        let cycle = self
            .get_cycle(cycle_id)
            .await?
            .ok_or_else(|| StoreError::not_found("cycle", cycle_id))?;
        if cycle.group_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.supabase
            .select("jackpot_groups", &[("id", in_list(cycle.group_ids.as_slice()))])
            .await
    }

    async fn get_subscription(&self, cycle_id: Uuid, user_id: Uuid) -> StoreResult<Option<CycleSubscription>> {
        self.supabase
            .select_one("cycle_subscriptions", &[("cycle_id", eq(cycle_id)), ("user_id", eq(user_id))])
            .await
    }

    async fn claim_subscription(&self, subscription: &CycleSubscription) -> StoreResult<bool> {
        let inserted = self
            .supabase
            .insert_ignoring_duplicates("cycle_subscriptions", std::slice::from_ref(subscription), "cycle_id,user_id")
            .await?;
        Ok(inserted > 0)
    }

    async fn release_subscription(&self, cycle_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.supabase
            .delete("cycle_subscriptions", &[("cycle_id", eq(cycle_id)), ("user_id", eq(user_id))])
            .await
    }

    async fn list_participants(&self, cycle_id: Uuid) -> StoreResult<Vec<Participant>> {
        self.supabase
            .select("participants", &[("cycle_id", eq(cycle_id))])
            .await
    }

    async fn update_participant(&self, participant: &Participant) -> StoreResult<()> {
        self.patch_one(
            "participants",
            participant.id,
            json!({
                "personal_outcome": participant.personal_outcome,
                "rollover_credit": participant.rollover_credit,
            }),
        )
        .await
    }

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let row: Option<ProfileRow> = self.supabase.select_one("profiles", &[("id", eq(user_id))]).await?;
        Ok(row.map(|r| Profile { user_id: r.id, credits: r.credits }))
    }

    async fn adjust_credits(&self, user_id: Uuid, delta: i64) -> StoreResult<i64> {
        let result = self
            .supabase
            .rpc("adjust_credits", &json!({ "p_user_id": user_id, "p_delta": delta }))
            .await;

        match result {
            Ok(value) => value
                .as_i64()
                .ok_or_else(|| StoreError::Decode(format!("adjust_credits returned {}", value))),
            Err(StoreError::Backend(msg)) if msg.contains("insufficient_credits") => {
                let available = self.get_profile(user_id).await?.map(|p| p.credits).unwrap_or(0);
                Err(StoreError::InsufficientCredits { required: -delta, available })
            }
            Err(e) => Err(e),
        }
    }

    async fn cascade_group_settlement(&self, group_id: Uuid) -> StoreResult<CascadeSummary> {
        let value = self
            .supabase
            .rpc("settle_group_and_update_cycles", &json!({ "p_group_id": group_id }))
            .await?;

        // Set-returning functions come back as a one-row array
        let row = match value {
            Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
            Value::Array(_) | Value::Null => return Ok(CascadeSummary::default()),
            other => other,
        };
        serde_json::from_value(row).map_err(|e| StoreError::Decode(format!("settle_group_and_update_cycles: {}", e)))
    }
}
