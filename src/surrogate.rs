//! Surrogates
//!
//! Backup splits that route rows whose value in the primary split column is missing. Candidates are
//! searched on a left/right target derived from the primary split and ranked by how much better they
//! predict that routing than simply sending every row to the larger child.
use crate::bitset::intersection_count;
use fixedbitset::FixedBitSet;
use crate::condition::{ColumnCondition, NodeCondition};
use crate::config::MissingValueHandling;
use crate::data::{NominalTarget, TreeData};
use crate::impurity::ClassificationPriors;
use crate::memberships::DataMemberships;
use crate::sampler::ColumnSample;
use crate::splitter::{best_split_classification, SplitCandidate, SplitSettings};
use crate::utils::cmp_f64;
use log::trace;
use rand::rngs::StdRng;

/// Backup split for one primary split.
#[derive(Debug, Clone)]
pub struct SurrogateEntry {
    pub candidate: SplitCandidate,
    pub association: f64,
    /// The surrogate predicts the primary routing with its children swapped.
    pub use_complement: bool,
    conditions: [ColumnCondition; 2],
}

impl SurrogateEntry {
    /// Conditions for the primary's left and right child, swapped if the complement is used.
    pub fn conditions(&self) -> [&ColumnCondition; 2] {
        if self.use_complement {
            [&self.conditions[1], &self.conditions[0]]
        } else {
            [&self.conditions[0], &self.conditions[1]]
        }
    }

    /// Some(true) if the row goes left, None if the surrogate column is missing too.
    fn goes_left(&self, data: &TreeData, row: usize) -> Option<bool> {
        let condition = self.conditions()[0];
        condition.test_value(data.column(condition.column()).value(row))
    }
}

/// One routing step for rows missing in the primary column, in the order they are tried.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingRule {
    Surrogate { column: usize, association: f64 },
    Majority { goes_left: bool },
}

/// Binary split with its surrogates, the resulting child rows and child conditions.
#[derive(Debug, Clone)]
pub struct SurrogateSplit {
    pub surrogates: Vec<SurrogateEntry>,
    pub majority_goes_left: bool,
    pub child_markers: [FixedBitSet; 2],
    pub child_conditions: [NodeCondition; 2],
}

impl SurrogateSplit {
    /// Surrogates by descending association, the majority rule last.
    pub fn rules(&self) -> Vec<RoutingRule> {
        self.surrogates
            .iter()
            .map(|s| RoutingRule::Surrogate {
                column: s.candidate.column,
                association: s.association,
            })
            .chain(std::iter::once(RoutingRule::Majority {
                goes_left: self.majority_goes_left,
            }))
            .collect()
    }
}

/// Rows of the node per child of `candidate`, missing values are left out.
fn present_markers(
    data: &TreeData,
    memberships: &DataMemberships,
    conditions: &[ColumnCondition],
) -> Vec<FixedBitSet> {
    let mut markers = vec![FixedBitSet::with_capacity(memberships.row_count()); conditions.len()];
    for e in memberships.entries() {
        for (child, condition) in conditions.iter().enumerate() {
            if condition.test_value(data.column(condition.column()).value(e.original)) == Some(true) {
                markers[child].insert(e.local);
                break;
            }
        }
    }
    markers
}

/// Children of a split without surrogates. Missing rows go to the candidate's missing child.
pub fn default_direction_split(
    data: &TreeData,
    memberships: &DataMemberships,
    candidate: &SplitCandidate,
) -> (Vec<FixedBitSet>, Vec<NodeCondition>) {
    let conditions = candidate.child_conditions();
    let mut markers = vec![FixedBitSet::with_capacity(memberships.row_count()); conditions.len()];
    let column = data.column(candidate.column);
    for e in memberships.entries() {
        let value = column.value(e.original);
        let child = conditions
            .iter()
            .position(|c| c.test(value))
            .unwrap_or_else(|| candidate.missing_child());
        markers[child].insert(e.local);
    }
    (markers, conditions.into_iter().map(NodeCondition::Column).collect())
}

/// Search surrogates for a binary `best` split among the other columns of the sample.
pub fn learn_surrogates(
    data: &TreeData,
    memberships: &DataMemberships,
    best: &SplitCandidate,
    column_sample: &ColumnSample,
    settings: &SplitSettings,
    rng: &mut StdRng,
) -> SurrogateSplit {
    let best_conditions = best.child_conditions();
    let markers = present_markers(data, memberships, &best_conditions);
    let (left, right) = (&markers[0], &markers[1]);

    let mut values = vec![0u32; data.nr_rows()];
    for e in memberships.entries() {
        if right.contains(e.local) {
            values[e.original] = 1;
        }
    }
    let target = NominalTarget::from_indices("surrogate", vec!["left".to_string(), "right".to_string()], values);
    let mut present = left.clone();
    present.union_with(right);
    let surrogate_memberships = memberships.create_child(&present);
    let priors = ClassificationPriors::from_memberships(&target, &surrogate_memberships, settings.criterion);
    let surrogate_settings = SplitSettings {
        missing_value_handling: MissingValueHandling::Majority,
        ..*settings
    };
    let candidates: Vec<SplitCandidate> = column_sample
        .columns()
        .iter()
        .filter(|c| **c != best.column)
        .filter_map(|c| {
            best_split_classification(
                data.column(*c),
                *c,
                &surrogate_memberships,
                &priors,
                &target,
                &surrogate_settings,
                rng,
            )
        })
        .filter(|c| c.nr_children() == 2)
        .collect();
    calculate_surrogates(data, memberships, best, candidates)
}

/// Rank `candidates` by association with the routing of `best` and route its missing rows.
pub fn calculate_surrogates(
    data: &TreeData,
    memberships: &DataMemberships,
    best: &SplitCandidate,
    candidates: Vec<SplitCandidate>,
) -> SurrogateSplit {
    let best_conditions = best.child_conditions();
    let markers = present_markers(data, memberships, &best_conditions);
    let (left, right) = (&markers[0], &markers[1]);
    let n = memberships.row_count() as f64;
    let prob_left = left.count_ones(..) as f64 / n;
    let prob_right = right.count_ones(..) as f64 / n;
    let majority_goes_left = prob_right <= prob_left;
    let error_majority_rule = if majority_goes_left { prob_right } else { prob_left };

    let mut surrogates: Vec<SurrogateEntry> = Vec::new();
    if error_majority_rule > 0.0 {
        for candidate in candidates {
            let conditions = candidate.child_conditions();
            let candidate_markers = present_markers(data, memberships, &conditions);
            let (cand_left, cand_right) = (&candidate_markers[0], &candidate_markers[1]);
            let predict = (intersection_count(left, cand_left) + intersection_count(right, cand_right)) as f64 / n;
            let complement = (intersection_count(left, cand_right) + intersection_count(right, cand_left)) as f64 / n;
            let use_complement = complement > predict;
            let predict_prob = predict.max(complement);
            let association = (error_majority_rule - (1.0 - predict_prob)) / error_majority_rule;
            if association > 0.0 {
                let [l, r]: [ColumnCondition; 2] = match conditions.try_into() {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                surrogates.push(SurrogateEntry {
                    candidate,
                    association,
                    use_complement,
                    conditions: [l.with_accepts_missing(false), r.with_accepts_missing(false)],
                });
            }
        }
    }
    surrogates.sort_by(|a, b| cmp_f64(&b.association, &a.association));
    trace!(
        "surrogates for column {}: {:?}",
        best.column,
        surrogates.iter().map(|s| (s.candidate.column, s.association)).collect::<Vec<_>>()
    );

    let mut child_markers = [left.clone(), right.clone()];
    for local in best.missed_rows.ones() {
        let row = memberships.original_indices()[local];
        let goes_left = surrogates
            .iter()
            .find_map(|s| s.goes_left(data, row))
            .unwrap_or(majority_goes_left);
        child_markers[usize::from(!goes_left)].insert(local);
    }

    let chain = |side: usize| {
        std::iter::once(best_conditions[side].clone().with_accepts_missing(false))
            .chain(surrogates.iter().map(|s| s.conditions()[side].clone()))
            .collect::<Vec<_>>()
    };
    let child_conditions = [
        NodeCondition::Surrogate {
            conditions: chain(0),
            default_response: majority_goes_left,
        },
        NodeCondition::Surrogate {
            conditions: chain(1),
            default_response: !majority_goes_left,
        },
    ];
    SurrogateSplit {
        surrogates,
        majority_goes_left,
        child_markers,
        child_conditions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset;
    use crate::config::MissingValueHandling;
    use crate::data::TreeDataBuilder;
    use crate::impurity::SplitCriterion;
    use crate::sampler::RowSample;
    use crate::splitter::SplitKind;
    use rand::SeedableRng;

    fn settings() -> SplitSettings {
        SplitSettings {
            criterion: SplitCriterion::Gini,
            min_child_size: 0.0,
            missing_value_handling: MissingValueHandling::Surrogate,
            use_average_split_points: true,
            use_binary_nominal_splits: true,
        }
    }

    fn data() -> TreeData {
        // x is missing in rows 2 and 7, z agrees with x, w agrees with x flipped, noise is weak
        TreeDataBuilder::new()
            .add_numeric_column("x", vec![1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0, 7.0, f64::NAN])
            .add_numeric_column("z", vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0])
            .add_numeric_column("w", vec![8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0])
            .add_numeric_column("noise", vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0])
            .set_nominal_target("t", &["a", "a", "a", "a", "b", "b", "b", "b"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_learn_surrogates() {
        let data = data();
        let memberships = DataMemberships::root(&RowSample::all(8));
        let best = SplitCandidate {
            column: 0,
            gain: 0.5,
            missed_rows: bitset::from_indices(8, [2, 7]),
            kind: SplitKind::Numeric {
                threshold: 4.5,
                missing_child: 0,
            },
        };
        let mut rng = StdRng::seed_from_u64(0);
        let split = learn_surrogates(&data, &memberships, &best, &ColumnSample::all(4), &settings(), &mut rng);

        assert!(!split.surrogates.is_empty());
        let rules = split.rules();
        assert!(matches!(rules.last(), Some(RoutingRule::Majority { .. })));
        let associations: Vec<f64> = split.surrogates.iter().map(|s| s.association).collect();
        assert!(associations.windows(2).all(|w| w[0] >= w[1]));
        assert!(associations.iter().all(|a| *a > 0.0));

        // the missing rows follow the surrogates: row 2 left, row 7 right
        assert!(split.child_markers[0].contains(2));
        assert!(split.child_markers[1].contains(7));
        assert_eq!(
            split.child_markers[0].count_ones(..) + split.child_markers[1].count_ones(..),
            memberships.row_count()
        );
        assert_eq!(intersection_count(&split.child_markers[0], &split.child_markers[1]), 0);

        let w = split.surrogates.iter().find(|s| s.candidate.column == 2).unwrap();
        assert!(w.use_complement);

        // a record missing every value falls back to the majority direction
        let record = crate::data::PredictorRecord {
            values: vec![crate::data::RecordValue::Missing; 4],
        };
        assert_eq!(split.child_conditions[0].test(&record), split.majority_goes_left);
        assert_ne!(split.child_conditions[0].test(&record), split.child_conditions[1].test(&record));
    }

    #[test]
    fn test_default_direction_split() {
        let data = data();
        let memberships = DataMemberships::root(&RowSample::all(8));
        let best = SplitCandidate {
            column: 0,
            gain: 0.5,
            missed_rows: bitset::from_indices(8, [2, 7]),
            kind: SplitKind::Numeric {
                threshold: 4.5,
                missing_child: 1,
            },
        };
        let (markers, conditions) = default_direction_split(&data, &memberships, &best);
        assert_eq!(markers[0].ones().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(markers[1].ones().collect::<Vec<_>>(), vec![2, 4, 5, 6, 7]);
        assert_eq!(conditions.len(), 2);
    }
}
