//! Correctness Tally - counts picks that match finished fixtures.

use std::collections::{BTreeMap, HashMap, HashSet};

use uuid::Uuid;

use crate::domain::{Fixture, Pick, Prediction, Variant};

/// Correct picks per variant id
pub type CorrectTally = BTreeMap<Uuid, u32>;

/// Count correct predictions per variant.
///
/// Every variant in `variants` appears in the result, with 0 when nothing
/// matched. Predictions whose fixture is unknown, unfinished or has no result
/// never count. A repeated (variant, fixture) pair counts once, by its
/// first row.
pub fn tally_correct(variants: &[Variant], fixtures: &[Fixture], predictions: &[Prediction]) -> CorrectTally {
    let results: HashMap<Uuid, Option<Pick>> = fixtures
        .iter()
        .map(|f| (f.id, f.graded_result()))
        .collect();

    let mut tally: CorrectTally = variants.iter().map(|v| (v.id, 0)).collect();
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::with_capacity(predictions.len());

    for prediction in predictions {
        let Some(count) = tally.get_mut(&prediction.variant_id) else {
            continue;
        };
        if !seen.insert((prediction.variant_id, prediction.fixture_id)) {
            continue;
        }
        if let Some(Some(result)) = results.get(&prediction.fixture_id) {
            if *result == prediction.pick {
                *count += 1;
            }
        }
    }

    tally
}

/// Number of fixtures that block locking (finished, no result)
pub fn missing_results(fixtures: &[Fixture]) -> usize {
    fixtures.iter().filter(|f| f.is_missing_result()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FixtureStatus, VariantLabel};

    fn fixture(group_id: Uuid, seq: u32, status: FixtureStatus, result: Option<Pick>) -> Fixture {
        Fixture {
            id: Uuid::new_v4(),
            group_id,
            seq,
            home_team: format!("Home {}", seq),
            away_team: format!("Away {}", seq),
            kickoff_time: None,
            status,
            result,
            final_score: None,
        }
    }

    fn predict(variant: &Variant, fixture: &Fixture, pick: Pick) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            variant_id: variant.id,
            fixture_id: fixture.id,
            pick,
        }
    }

    fn variant(group_id: Uuid, label: VariantLabel) -> Variant {
        Variant { id: Uuid::new_v4(), group_id, label }
    }

    #[test]
    fn test_counts_only_matching_finished_results() {
        let group = Uuid::new_v4();
        let a = variant(group, VariantLabel::A);
        let fixtures = vec![
            fixture(group, 1, FixtureStatus::Finished, Some(Pick::Home)),
            fixture(group, 2, FixtureStatus::Finished, Some(Pick::Home)),
            fixture(group, 3, FixtureStatus::Finished, Some(Pick::Away)),
        ];
        let picks = [Pick::Home, Pick::Draw, Pick::Away];
        let predictions: Vec<_> = fixtures.iter().zip(picks).map(|(f, p)| predict(&a, f, p)).collect();

        let tally = tally_correct(&[a.clone()], &fixtures, &predictions);
        assert_eq!(tally[&a.id], 2);
    }

    #[test]
    fn test_unfinished_or_missing_results_never_count() {
        let group = Uuid::new_v4();
        let a = variant(group, VariantLabel::A);
        let fixtures = vec![
            fixture(group, 1, FixtureStatus::Void, Some(Pick::Home)),
            fixture(group, 2, FixtureStatus::Postponed, Some(Pick::Draw)),
            fixture(group, 3, FixtureStatus::Finished, None),
            fixture(group, 4, FixtureStatus::Scheduled, Some(Pick::Away)),
        ];
        let mut predictions = Vec::new();
        for f in &fixtures {
            for pick in [Pick::Home, Pick::Draw, Pick::Away] {
                predictions.push(predict(&a, f, pick));
            }
        }

        let tally = tally_correct(&[a.clone()], &fixtures, &predictions);
        assert_eq!(tally[&a.id], 0);
    }

    #[test]
    fn test_variant_without_predictions_is_zero() {
        let group = Uuid::new_v4();
        let a = variant(group, VariantLabel::A);
        let b = variant(group, VariantLabel::B);
        let f = fixture(group, 1, FixtureStatus::Finished, Some(Pick::Draw));
        let predictions = vec![predict(&a, &f, Pick::Draw)];

        let tally = tally_correct(&[a.clone(), b.clone()], &[f], &predictions);
        assert_eq!(tally[&a.id], 1);
        assert_eq!(tally.get(&b.id), Some(&0));
    }

    #[test]
    fn test_tally_is_repeatable() {
        let group = Uuid::new_v4();
        let a = variant(group, VariantLabel::A);
        let b = variant(group, VariantLabel::B);
        let fixtures: Vec<_> = (1..=5)
            .map(|seq| fixture(group, seq, FixtureStatus::Finished, Some(Pick::Home)))
            .collect();
        let mut predictions: Vec<_> = fixtures.iter().map(|f| predict(&a, f, Pick::Home)).collect();
        predictions.extend(fixtures.iter().map(|f| predict(&b, f, Pick::Away)));

        let variants = [a, b];
        let first = tally_correct(&variants, &fixtures, &predictions);
        let second = tally_correct(&variants, &fixtures, &predictions);
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_prediction_rows_count_once() {
        let group = Uuid::new_v4();
        let a = variant(group, VariantLabel::A);
        let f = fixture(group, 1, FixtureStatus::Finished, Some(Pick::Home));
        let predictions = vec![
            predict(&a, &f, Pick::Home),
            predict(&a, &f, Pick::Home),
            predict(&a, &f, Pick::Home),
        ];

        let tally = tally_correct(&[a.clone()], &[f], &predictions);
        assert_eq!(tally[&a.id], 1);
    }

    #[test]
    fn test_missing_results_count() {
        let group = Uuid::new_v4();
        let fixtures = vec![
            fixture(group, 1, FixtureStatus::Finished, None),
            fixture(group, 2, FixtureStatus::Finished, None),
            fixture(group, 3, FixtureStatus::Finished, Some(Pick::Home)),
            fixture(group, 4, FixtureStatus::Void, None),
        ];
        assert_eq!(missing_results(&fixtures), 2);
    }
}
