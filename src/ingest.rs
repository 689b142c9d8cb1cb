//! Admin ingestion: jackpot groups, payout rules, lifecycle moves.
//!
//! Payloads are what the admin pastes after the AI-assisted extraction step.
//! Everything is validated before the first row is written.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::*;
use crate::settlement::{TierError, TierTable};
use crate::store::{JackpotStore, StoreError};

/// Largest prediction batch sent in one insert
pub const PREDICTION_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, thiserror::Error)]
pub enum IngestError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Group has no fixtures")]
    NoFixtures,

    #[error("Duplicate fixture seq {0}")]
    DuplicateSeq(u32),

    #[error("Duplicate variant {0:?}")]
    DuplicateVariant(VariantLabel),

    #[error("Variant {label:?} has {got} pick(s) for {expected} fixture(s)")]
    PickCountMismatch { label: VariantLabel, expected: usize, got: usize },

    #[error("Variant {label:?} pick #{index}: invalid value {raw:?}")]
    InvalidPick { label: VariantLabel, index: usize, raw: String },

    #[error("Invalid prize pool {0}")]
    InvalidPrizePool(f64),

    #[error("Jackpot group not found: {0}")]
    GroupNotFound(Uuid),

    #[error("Invalid group transition: {from} -> {to}")]
    InvalidTransition { from: GroupStatus, to: GroupStatus },

    #[error("Invalid tier table: {0}")]
    Tiers(#[from] TierError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureInput {
    pub seq: u32,
    pub home: String,
    pub away: String,
    #[serde(default)]
    pub kickoff_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantInput {
    pub label: VariantLabel,
    /// One pick per fixture, in seq order
    pub picks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupPayload {
    pub site: String,
    pub jackpot_type: String,
    #[serde(default)]
    pub lock_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub prize_pool: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub fixtures: Vec<FixtureInput>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

fn default_currency() -> String {
    "KES".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub group_id: Uuid,
    pub fixtures: usize,
    pub variants: usize,
    pub predictions: usize,
    pub batches: usize,
}

/// Rows ready to write, built from a validated payload
#[derive(Debug, Clone)]
pub struct GroupRows {
    pub group: JackpotGroup,
    pub fixtures: Vec<Fixture>,
    pub variants: Vec<Variant>,
    pub predictions: Vec<Prediction>,
}

impl GroupPayload {
    /// Validate and expand into rows. The group starts as `draft`.
    pub fn into_rows(mut self) -> Result<GroupRows, IngestError> {
        if self.site.trim().is_empty() {
            return Err(IngestError::MissingField("site"));
        }
        if self.jackpot_type.trim().is_empty() {
            return Err(IngestError::MissingField("jackpot_type"));
        }
        if self.fixtures.is_empty() {
            return Err(IngestError::NoFixtures);
        }
        if let Some(pool) = self.prize_pool {
            if !pool.is_finite() || pool < 0.0 {
                return Err(IngestError::InvalidPrizePool(pool));
            }
        }

        self.fixtures.sort_by_key(|f| f.seq);
        let mut seen = HashSet::new();
        for f in &self.fixtures {
            if !seen.insert(f.seq) {
                return Err(IngestError::DuplicateSeq(f.seq));
            }
        }

        let group = JackpotGroup {
            id: Uuid::new_v4(),
            site: self.site.trim().to_string(),
            jackpot_type: self.jackpot_type.trim().to_string(),
            status: GroupStatus::Draft,
            lock_time: self.lock_time,
            end_time: self.end_time,
            prize_pool: self.prize_pool,
            currency: self.currency,
        };

        let fixtures: Vec<Fixture> = self
            .fixtures
            .iter()
            .map(|f| Fixture {
                id: Uuid::new_v4(),
                group_id: group.id,
                seq: f.seq,
                home_team: f.home.trim().to_string(),
                away_team: f.away.trim().to_string(),
                kickoff_time: f.kickoff_time,
                status: FixtureStatus::Scheduled,
                result: None,
                final_score: None,
            })
            .collect();

        let mut labels = HashSet::new();
        let mut variants = Vec::with_capacity(self.variants.len());
        let mut predictions = Vec::new();
        for input in &self.variants {
            if !labels.insert(input.label) {
                return Err(IngestError::DuplicateVariant(input.label));
            }
            if input.picks.len() != fixtures.len() {
                return Err(IngestError::PickCountMismatch {
                    label: input.label,
                    expected: fixtures.len(),
                    got: input.picks.len(),
                });
            }

            let variant = Variant {
                id: Uuid::new_v4(),
                group_id: group.id,
                label: input.label,
            };
            for (index, (raw, fixture)) in input.picks.iter().zip(&fixtures).enumerate() {
                let pick = Pick::parse(raw).ok_or_else(|| IngestError::InvalidPick {
                    label: input.label,
                    index: index + 1,
                    raw: raw.clone(),
                })?;
                predictions.push(Prediction {
                    id: Uuid::new_v4(),
                    variant_id: variant.id,
                    fixture_id: fixture.id,
                    pick,
                });
            }
            variants.push(variant);
        }

        Ok(GroupRows { group, fixtures, variants, predictions })
    }
}

#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn JackpotStore>,
}

impl IngestService {
    pub fn new(store: Arc<dyn JackpotStore>) -> Self {
        Self { store }
    }

    pub async fn ingest_group(&self, payload: GroupPayload) -> Result<IngestReport, IngestError> {
        let rows = payload.into_rows()?;
        let group_id = rows.group.id;

        self.store.insert_group(&rows.group).await?;
        self.store.insert_fixtures(&rows.fixtures).await?;
        self.store.insert_variants(&rows.variants).await?;

        let mut batches = 0;
        for chunk in rows.predictions.chunks(PREDICTION_BATCH_SIZE) {
            self.store.insert_predictions(chunk).await?;
            batches += 1;
        }

        info!(
            "📥 Ingested group {} ({}/{}): {} fixtures, {} variants, {} predictions",
            group_id,
            rows.group.site,
            rows.group.jackpot_type,
            rows.fixtures.len(),
            rows.variants.len(),
            rows.predictions.len()
        );

        Ok(IngestReport {
            group_id,
            fixtures: rows.fixtures.len(),
            variants: rows.variants.len(),
            predictions: rows.predictions.len(),
            batches,
        })
    }

    /// Validate a pasted tier table and store it for the site/jackpot type
    pub async fn put_payout_rule(&self, site: &str, jackpot_type: &str, tiers: &Value) -> Result<TierTable, IngestError> {
        if site.trim().is_empty() {
            return Err(IngestError::MissingField("site"));
        }
        if jackpot_type.trim().is_empty() {
            return Err(IngestError::MissingField("jackpot_type"));
        }
        let table = TierTable::from_json(tiers)?;
        self.store
            .upsert_payout_rule(site.trim(), jackpot_type.trim(), &table)
            .await?;
        info!("📊 Payout rule {}/{} stored ({} tiers)", site, jackpot_type, table.len());
        Ok(table)
    }

    pub async fn set_group_status(&self, group_id: Uuid, next: GroupStatus) -> Result<JackpotGroup, IngestError> {
        let mut group = self
            .store
            .get_group(group_id)
            .await?
            .ok_or(IngestError::GroupNotFound(group_id))?;

        if !group.status.can_transition_to(next) {
            return Err(IngestError::InvalidTransition { from: group.status, to: next });
        }
        if group.status != next {
            self.store.update_group_status(group_id, next).await?;
            info!("🔁 Group {} {} -> {}", group_id, group.status, next);
            group.status = next;
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> GroupPayload {
        serde_json::from_value(value).unwrap()
    }

    fn three_fixture_payload() -> Value {
        json!({
            "site": "sportpesa",
            "jackpot_type": "mega",
            "prize_pool": 1000.0,
            "fixtures": [
                {"seq": 2, "home": "C", "away": "D"},
                {"seq": 1, "home": "A", "away": "B"},
                {"seq": 3, "home": "E", "away": "F"}
            ],
            "variants": [
                {"label": "A", "picks": ["1", "X", "2"]},
                {"label": "B", "picks": ["x", "1", "1"]}
            ]
        })
    }

    #[test]
    fn test_rows_follow_seq_order() {
        let rows = payload(three_fixture_payload()).into_rows().unwrap();
        assert_eq!(rows.group.status, GroupStatus::Draft);
        assert_eq!(rows.group.currency, "KES");
        let seqs: Vec<u32> = rows.fixtures.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(rows.variants.len(), 2);
        assert_eq!(rows.predictions.len(), 6);

        // Picks line up with fixtures sorted by seq
        let first_fixture = rows.fixtures[0].id;
        let a = rows.variants.iter().find(|v| v.label == VariantLabel::A).unwrap();
        let pick = rows
            .predictions
            .iter()
            .find(|p| p.variant_id == a.id && p.fixture_id == first_fixture)
            .unwrap();
        assert_eq!(pick.pick, Pick::Home);
    }

    #[test]
    fn test_pick_count_mismatch() {
        let mut value = three_fixture_payload();
        value["variants"][0]["picks"] = json!(["1", "X"]);
        let err = payload(value).into_rows().unwrap_err();
        assert!(matches!(err, IngestError::PickCountMismatch { expected: 3, got: 2, .. }));
    }

    #[test]
    fn test_invalid_pick_reports_position() {
        let mut value = three_fixture_payload();
        value["variants"][1]["picks"] = json!(["1", "H", "2"]);
        let err = payload(value).into_rows().unwrap_err();
        assert!(matches!(err, IngestError::InvalidPick { label: VariantLabel::B, index: 2, .. }));
    }

    #[test]
    fn test_duplicate_seq_and_variant() {
        let mut value = three_fixture_payload();
        value["fixtures"][0]["seq"] = json!(1);
        assert!(matches!(payload(value).into_rows(), Err(IngestError::DuplicateSeq(1))));

        let mut value = three_fixture_payload();
        value["variants"][1]["label"] = json!("A");
        assert!(matches!(payload(value).into_rows(), Err(IngestError::DuplicateVariant(VariantLabel::A))));
    }

    #[test]
    fn test_empty_group_rejected() {
        let value = json!({"site": "betika", "jackpot_type": "midweek", "fixtures": []});
        assert!(matches!(payload(value).into_rows(), Err(IngestError::NoFixtures)));

        let value = json!({"site": " ", "jackpot_type": "midweek", "fixtures": [{"seq": 1, "home": "A", "away": "B"}]});
        assert!(matches!(payload(value).into_rows(), Err(IngestError::MissingField("site"))));
    }
}
