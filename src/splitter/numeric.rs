use super::{evaluate_binary, is_valid_gain, parent_score, SplitCandidate, SplitKind, SplitSettings, TargetStats, TieBreaker};
use fixedbitset::FixedBitSet;
use crate::data::NumericColumn;
use crate::memberships::DataMemberships;
use rand::rngs::StdRng;

struct Best {
    gain: f64,
    threshold: f64,
    missings_go_left: bool,
}

/// Scan the node's rows in value order and test every boundary between two distinct values.
pub(super) fn best_split<S: TargetStats>(
    column: &NumericColumn,
    column_index: usize,
    memberships: &DataMemberships,
    node: &S,
    settings: &SplitSettings,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let entries = memberships.sorted_entries(column);
    let first_missing = entries
        .iter()
        .position(|e| column.value(e.original).is_none())
        .unwrap_or(entries.len());
    let (present, missing_entries) = entries.split_at(first_missing);
    if present.len() < 2 {
        return None;
    }

    let mut missed_rows = FixedBitSet::with_capacity(memberships.row_count());
    let mut missing = node.empty();
    for e in missing_entries {
        missed_rows.insert(e.local);
        missing.add_row(e.original, e.weight);
    }
    let present_stats = node.subtract(&missing);
    let score = parent_score(node, &present_stats, &missing, settings);

    let mut left = node.empty();
    let mut best: Option<Best> = None;
    let mut ties = TieBreaker::new();
    for (i, e) in present[..present.len() - 1].iter().enumerate() {
        left.add_row(e.original, e.weight);
        let (Some(value), Some(next)) = (column.value(e.original), column.value(present[i + 1].original)) else {
            continue;
        };
        if next <= value {
            continue;
        }
        let right = present_stats.subtract(&left);
        let Some((gain, missings_go_left)) = evaluate_binary(score, &left, &right, &missing, settings) else {
            continue;
        };
        if !is_valid_gain(gain) || !ties.offer(gain, rng) {
            continue;
        }
        let threshold = if settings.use_average_split_points {
            value + (next - value) / 2.0
        } else {
            value
        };
        best = Some(Best {
            gain,
            threshold,
            missings_go_left,
        });
    }

    best.map(|b| {
        let kind = if settings.learns_missing_direction() && missed_rows.count_ones(..) > 0 {
            SplitKind::NumericWithMissing {
                threshold: b.threshold,
                missings_go_left: b.missings_go_left,
            }
        } else {
            SplitKind::Numeric {
                threshold: b.threshold,
                missing_child: usize::from(!b.missings_go_left),
            }
        };
        SplitCandidate {
            column: column_index,
            gain: b.gain,
            missed_rows,
            kind,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingValueHandling;
    use crate::data::{NominalTarget, NumericTarget, TreeColumn};
    use crate::impurity::{ClassificationPriors, RegressionPriors, SplitCriterion};
    use crate::sampler::RowSample;
    use crate::splitter::{best_split_classification, best_split_regression};
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn settings(missing: MissingValueHandling) -> SplitSettings {
        SplitSettings {
            criterion: SplitCriterion::Gini,
            min_child_size: 0.0,
            missing_value_handling: missing,
            use_average_split_points: true,
            use_binary_nominal_splits: true,
        }
    }

    #[test]
    fn test_numeric_classification_split() {
        let column = TreeColumn::Numeric(NumericColumn::new("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let target = NominalTarget::new("t", &["a", "a", "a", "b", "b", "b"]);
        let memberships = DataMemberships::root(&RowSample::all(6));
        let priors = ClassificationPriors::from_memberships(&target, &memberships, SplitCriterion::Gini);
        let mut rng = StdRng::seed_from_u64(0);
        let s = settings(MissingValueHandling::Majority);
        let candidate = best_split_classification(&column, 0, &memberships, &priors, &target, &s, &mut rng).unwrap();
        assert_relative_eq!(candidate.gain, 0.5);
        assert_eq!(
            candidate.kind,
            SplitKind::Numeric {
                threshold: 3.5,
                missing_child: 0
            }
        );
        assert_eq!(candidate.missed_rows.count_ones(..), 0);

        let lower = SplitSettings {
            use_average_split_points: false,
            ..s
        };
        let candidate =
            best_split_classification(&column, 0, &memberships, &priors, &target, &lower, &mut rng).unwrap();
        assert!(matches!(candidate.kind, SplitKind::Numeric { threshold, .. } if threshold == 3.0));
    }

    #[test]
    fn test_min_child_size_and_constant_column() {
        let column = TreeColumn::Numeric(NumericColumn::new("x", vec![1.0, 2.0, 3.0, 4.0]));
        let target = NominalTarget::new("t", &["a", "b", "b", "b"]);
        let memberships = DataMemberships::root(&RowSample::all(4));
        let priors = ClassificationPriors::from_memberships(&target, &memberships, SplitCriterion::Gini);
        let mut rng = StdRng::seed_from_u64(0);
        let s = SplitSettings {
            min_child_size: 2.0,
            ..settings(MissingValueHandling::Majority)
        };
        let candidate = best_split_classification(&column, 0, &memberships, &priors, &target, &s, &mut rng).unwrap();
        assert!(matches!(candidate.kind, SplitKind::Numeric { threshold, .. } if threshold == 2.5));

        let constant = TreeColumn::Numeric(NumericColumn::new("c", vec![1.0; 4]));
        assert!(best_split_classification(&constant, 0, &memberships, &priors, &target, &s, &mut rng).is_none());
    }

    #[test]
    fn test_missing_values() {
        let column = TreeColumn::Numeric(NumericColumn::new("x", vec![1.0, 2.0, f64::NAN, 4.0, 5.0, f64::NAN]));
        let target = NominalTarget::new("t", &["a", "a", "b", "b", "b", "b"]);
        let memberships = DataMemberships::root(&RowSample::all(6));
        let priors = ClassificationPriors::from_memberships(&target, &memberships, SplitCriterion::Gini);
        let mut rng = StdRng::seed_from_u64(0);

        let candidate = best_split_classification(
            &column,
            0,
            &memberships,
            &priors,
            &target,
            &settings(MissingValueHandling::Majority),
            &mut rng,
        )
        .unwrap();
        assert_eq!(candidate.missed_rows.ones().collect::<Vec<_>>(), vec![2, 5]);
        // the prior is computed on the four present rows, the split separates them perfectly
        assert_relative_eq!(candidate.gain, 0.5);

        let learned = best_split_classification(
            &column,
            0,
            &memberships,
            &priors,
            &target,
            &settings(MissingValueHandling::Learned),
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            learned.kind,
            SplitKind::NumericWithMissing {
                threshold: 3.0,
                missings_go_left: false
            }
        );
        assert_eq!(learned.missing_child(), 1);
    }

    #[test]
    fn test_numeric_regression_split() {
        let column = TreeColumn::Numeric(NumericColumn::new("x", vec![1.0, 2.0, 3.0, 4.0]));
        let target = NumericTarget::new("y", vec![1.0, 1.0, 5.0, 5.0]);
        let memberships = DataMemberships::root(&RowSample::all(4));
        let priors = RegressionPriors::from_memberships(&target, &memberships);
        let mut rng = StdRng::seed_from_u64(0);
        let candidate = best_split_regression(
            &column,
            0,
            &memberships,
            &priors,
            &target,
            &settings(MissingValueHandling::Majority),
            &mut rng,
        )
        .unwrap();
        // the split removes the whole squared deviation
        assert_relative_eq!(candidate.gain, priors.sum_squared_deviation());
        assert!(matches!(candidate.kind, SplitKind::Numeric { threshold, .. } if threshold == 2.5));
    }
}
