//! Tier Resolver
//!
//! A tier table maps "number of correct picks" thresholds to payouts. Site
//! admins paste tables in a loose JSON shape:
//!
//! ```json
//! { "12": 20000, "13": "35000", "14": {"kind": "percent", "pct": 0.1},
//!   "15": {"kind": "full", "label": "jackpot"} }
//! ```
//!
//! The table is parsed once at input time into [`TierTable`]; anything the
//! parser does not recognise is rejected there instead of silently paying
//! out nothing at settlement time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors raised while validating a pasted tier table
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TierError {
    #[error("Tier table must be a JSON object keyed by correct-count")]
    NotAnObject,

    #[error("Invalid tier threshold {0:?}: expected a non-negative integer")]
    InvalidThreshold(String),

    #[error("Tier {threshold}: unknown kind {kind:?}")]
    UnknownKind { threshold: u32, kind: String },

    #[error("Tier {threshold}: missing field {field}")]
    MissingField { threshold: u32, field: &'static str },

    #[error("Tier {threshold}: invalid amount {raw}")]
    InvalidAmount { threshold: u32, raw: String },

    #[error("Tier {threshold}: unsupported entry {raw}")]
    UnsupportedEntry { threshold: u32, raw: String },
}

/// How a count with no exact tier is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPolicy {
    /// Fall back to the highest threshold below the count
    #[default]
    Floor,
    /// Only an exact threshold counts as a hit
    ExactOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierEntry {
    Fixed { amount: f64 },
    Percent { pct: f64 },
    Full,
    /// Bare number (or numeric string) in the pasted table
    Raw { amount: f64 },
}

impl TierEntry {
    pub fn payout(&self, prize_pool: Option<f64>) -> Option<f64> {
        match *self {
            TierEntry::Fixed { amount } | TierEntry::Raw { amount } => Some(amount),
            TierEntry::Percent { pct } => prize_pool.map(|pool| pool * pct),
            TierEntry::Full => prize_pool,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub threshold: u32,
    pub entry: TierEntry,
    pub label: Option<String>,
}

impl Tier {
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}_correct", self.threshold),
        }
    }
}

/// What a variant earned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierResolution {
    pub tier_hit: Option<String>,
    pub payout_estimated: Option<f64>,
}

/// Validated tier table, ordered by threshold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierTable {
    tiers: BTreeMap<u32, Tier>,
}

impl TierTable {
    pub fn new(tiers: impl IntoIterator<Item = Tier>) -> Self {
        Self {
            tiers: tiers.into_iter().map(|t| (t.threshold, t)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn tiers(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.values()
    }

    /// Parse the loose admin format
    pub fn from_json(value: &Value) -> Result<Self, TierError> {
        let object = value.as_object().ok_or(TierError::NotAnObject)?;
        let mut tiers = BTreeMap::new();
        for (key, raw) in object {
            let threshold: u32 = key
                .trim()
                .parse()
                .map_err(|_| TierError::InvalidThreshold(key.clone()))?;
            tiers.insert(threshold, parse_tier(threshold, raw)?);
        }
        Ok(Self { tiers })
    }

    /// Canonical JSON form, readable again by [`TierTable::from_json`]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for tier in self.tiers.values() {
            let mut entry = Map::new();
            match tier.entry {
                TierEntry::Fixed { amount } | TierEntry::Raw { amount } => {
                    entry.insert("kind".into(), "fixed".into());
                    entry.insert("amount".into(), amount.into());
                }
                TierEntry::Percent { pct } => {
                    entry.insert("kind".into(), "percent".into());
                    entry.insert("pct".into(), pct.into());
                }
                TierEntry::Full => {
                    entry.insert("kind".into(), "full".into());
                }
            }
            if let Some(label) = &tier.label {
                entry.insert("label".into(), label.clone().into());
            }
            object.insert(tier.threshold.to_string(), Value::Object(entry));
        }
        Value::Object(object)
    }

    /// Pick the tier reached by `correct_count` under `policy`
    pub fn select(&self, correct_count: u32, policy: TierPolicy) -> Option<&Tier> {
        if let Some(exact) = self.tiers.get(&correct_count) {
            return Some(exact);
        }
        match policy {
            TierPolicy::Floor => self.tiers.range(..=correct_count).next_back().map(|(_, t)| t),
            TierPolicy::ExactOnly => None,
        }
    }

    pub fn resolve(&self, correct_count: u32, prize_pool: Option<f64>, policy: TierPolicy) -> TierResolution {
        match self.select(correct_count, policy) {
            Some(tier) => TierResolution {
                tier_hit: Some(tier.label()),
                payout_estimated: tier.entry.payout(prize_pool),
            },
            None => TierResolution::default(),
        }
    }
}

impl Serialize for TierTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TierTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        TierTable::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Floor-policy resolution straight from a pasted table
pub fn compute_tier_and_payout(
    correct_count: u32,
    prize_pool: Option<f64>,
    tiers: &Value,
) -> Result<TierResolution, TierError> {
    Ok(TierTable::from_json(tiers)?.resolve(correct_count, prize_pool, TierPolicy::Floor))
}

fn parse_tier(threshold: u32, raw: &Value) -> Result<Tier, TierError> {
    match raw {
        Value::Number(_) | Value::String(_) => Ok(Tier {
            threshold,
            entry: TierEntry::Raw { amount: parse_amount(threshold, raw)? },
            label: None,
        }),
        Value::Object(fields) => {
            let label = match fields.get("label") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => {
                    return Err(TierError::UnsupportedEntry { threshold, raw: other.to_string() })
                }
            };
            let kind = fields
                .get("kind")
                .and_then(Value::as_str)
                .ok_or(TierError::MissingField { threshold, field: "kind" })?;
            let entry = match kind {
                "fixed" => TierEntry::Fixed {
                    amount: required_amount(threshold, fields, "amount")?,
                },
                "percent" => TierEntry::Percent {
                    pct: required_amount(threshold, fields, "pct")?,
                },
                "full" => TierEntry::Full,
                other => {
                    return Err(TierError::UnknownKind { threshold, kind: other.to_string() })
                }
            };
            Ok(Tier { threshold, entry, label })
        }
        other => Err(TierError::UnsupportedEntry { threshold, raw: other.to_string() }),
    }
}

fn required_amount(threshold: u32, fields: &Map<String, Value>, field: &'static str) -> Result<f64, TierError> {
    let raw = fields.get(field).ok_or(TierError::MissingField { threshold, field })?;
    parse_amount(threshold, raw)
}

fn parse_amount(threshold: u32, raw: &Value) -> Result<f64, TierError> {
    let amount = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match amount {
        Some(a) if a.is_finite() && a >= 0.0 => Ok(a),
        _ => Err(TierError::InvalidAmount { threshold, raw: raw.to_string() }),
    }
}
