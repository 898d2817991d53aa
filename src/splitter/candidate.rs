use fixedbitset::FixedBitSet;
use crate::condition::ColumnCondition;

/// How a nominal column is partitioned.
#[derive(Debug, Clone, PartialEq)]
pub enum NominalPartition {
    /// Values in `right_values` go right, all others left. The right side always holds the
    /// highest present value index.
    Binary { right_values: FixedBitSet },
    /// One child per value, in the given order.
    Multiway { values: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SplitKind {
    /// Missing rows were left out of the search and follow `missing_child` unless surrogates route them.
    Numeric { threshold: f64, missing_child: usize },
    /// The search evaluated missing rows on both sides and kept the better one.
    NumericWithMissing { threshold: f64, missings_go_left: bool },
    Nominal {
        partition: NominalPartition,
        missing_child: usize,
    },
    /// Zeros go left, ones go right.
    BitVector { missing_child: usize },
}

/// Best split found on one column of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCandidate {
    pub column: usize,
    pub gain: f64,
    /// Positions, within the node, of the rows whose value in `column` is missing.
    pub missed_rows: FixedBitSet,
    pub kind: SplitKind,
}

impl SplitCandidate {
    pub fn nr_children(&self) -> usize {
        match &self.kind {
            SplitKind::Nominal {
                partition: NominalPartition::Multiway { values },
                ..
            } => values.len(),
            _ => 2,
        }
    }

    /// Child receiving rows with a missing value if no surrogate decides.
    pub fn missing_child(&self) -> usize {
        match &self.kind {
            SplitKind::Numeric { missing_child, .. }
            | SplitKind::Nominal { missing_child, .. }
            | SplitKind::BitVector { missing_child } => *missing_child,
            SplitKind::NumericWithMissing { missings_go_left, .. } => usize::from(!*missings_go_left),
        }
    }

    /// Multiway nominal and bit splits leave a single value in every child.
    pub fn can_column_be_split_further(&self) -> bool {
        match &self.kind {
            SplitKind::Numeric { .. } | SplitKind::NumericWithMissing { .. } => true,
            SplitKind::Nominal { partition, .. } => matches!(partition, NominalPartition::Binary { .. }),
            SplitKind::BitVector { .. } => false,
        }
    }

    /// One condition per child, the missing child accepts missing values.
    pub fn child_conditions(&self) -> Vec<ColumnCondition> {
        let column = self.column;
        let missing_child = self.missing_child();
        let conditions = match &self.kind {
            SplitKind::Numeric { threshold, .. } | SplitKind::NumericWithMissing { threshold, .. } => vec![
                ColumnCondition::NumericLessOrEqual {
                    column,
                    threshold: *threshold,
                    accepts_missing: false,
                },
                ColumnCondition::NumericGreater {
                    column,
                    threshold: *threshold,
                    accepts_missing: false,
                },
            ],
            SplitKind::Nominal {
                partition: NominalPartition::Binary { right_values },
                ..
            } => vec![
                ColumnCondition::NominalIn {
                    column,
                    values: right_values.clone(),
                    negated: true,
                    accepts_missing: false,
                },
                ColumnCondition::NominalIn {
                    column,
                    values: right_values.clone(),
                    negated: false,
                    accepts_missing: false,
                },
            ],
            SplitKind::Nominal {
                partition: NominalPartition::Multiway { values },
                ..
            } => values
                .iter()
                .map(|v| ColumnCondition::NominalEquals {
                    column,
                    value: *v,
                    accepts_missing: false,
                })
                .collect(),
            SplitKind::BitVector { .. } => vec![
                ColumnCondition::BitEquals {
                    column,
                    bit: false,
                    accepts_missing: false,
                },
                ColumnCondition::BitEquals {
                    column,
                    bit: true,
                    accepts_missing: false,
                },
            ],
        };
        conditions
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_accepts_missing(i == missing_child))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RecordValue;

    #[test]
    fn test_child_conditions() {
        let candidate = SplitCandidate {
            column: 2,
            gain: 0.3,
            missed_rows: FixedBitSet::with_capacity(4),
            kind: SplitKind::NumericWithMissing {
                threshold: 1.0,
                missings_go_left: false,
            },
        };
        let conditions = candidate.child_conditions();
        assert_eq!(conditions.len(), 2);
        assert!(!conditions[0].test(RecordValue::Missing));
        assert!(conditions[1].test(RecordValue::Missing));
        assert!(conditions[0].test(RecordValue::Number(1.0)));
        assert!(candidate.can_column_be_split_further());
    }

    #[test]
    fn test_multiway() {
        let candidate = SplitCandidate {
            column: 0,
            gain: 0.1,
            missed_rows: FixedBitSet::with_capacity(3),
            kind: SplitKind::Nominal {
                partition: NominalPartition::Multiway { values: vec![0, 2, 3] },
                missing_child: 1,
            },
        };
        assert_eq!(candidate.nr_children(), 3);
        assert!(!candidate.can_column_be_split_further());
        let conditions = candidate.child_conditions();
        assert!(conditions[1].accepts_missing());
        assert!(conditions[2].test(RecordValue::Category(3)));
    }
}
