//! Conditions
//!
//! Tests attached to tree nodes. A row belongs to the first child whose condition accepts it.
use fixedbitset::FixedBitSet;
use crate::data::{PredictorRecord, RecordValue, TreeData, TreeMetaData};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Test on a single column. `accepts_missing` decides rows with a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnCondition {
    NumericLessOrEqual {
        column: usize,
        threshold: f64,
        accepts_missing: bool,
    },
    NumericGreater {
        column: usize,
        threshold: f64,
        accepts_missing: bool,
    },
    /// Value is one of `values`, or none of them if `negated`.
    NominalIn {
        column: usize,
        values: FixedBitSet,
        negated: bool,
        accepts_missing: bool,
    },
    NominalEquals {
        column: usize,
        value: u32,
        accepts_missing: bool,
    },
    BitEquals {
        column: usize,
        bit: bool,
        accepts_missing: bool,
    },
}

impl ColumnCondition {
    pub fn column(&self) -> usize {
        match self {
            ColumnCondition::NumericLessOrEqual { column, .. }
            | ColumnCondition::NumericGreater { column, .. }
            | ColumnCondition::NominalIn { column, .. }
            | ColumnCondition::NominalEquals { column, .. }
            | ColumnCondition::BitEquals { column, .. } => *column,
        }
    }

    pub fn accepts_missing(&self) -> bool {
        match self {
            ColumnCondition::NumericLessOrEqual { accepts_missing, .. }
            | ColumnCondition::NumericGreater { accepts_missing, .. }
            | ColumnCondition::NominalIn { accepts_missing, .. }
            | ColumnCondition::NominalEquals { accepts_missing, .. }
            | ColumnCondition::BitEquals { accepts_missing, .. } => *accepts_missing,
        }
    }

    pub fn with_accepts_missing(mut self, value: bool) -> Self {
        match &mut self {
            ColumnCondition::NumericLessOrEqual { accepts_missing, .. }
            | ColumnCondition::NumericGreater { accepts_missing, .. }
            | ColumnCondition::NominalIn { accepts_missing, .. }
            | ColumnCondition::NominalEquals { accepts_missing, .. }
            | ColumnCondition::BitEquals { accepts_missing, .. } => *accepts_missing = value,
        }
        self
    }

    /// Outcome for a present value, None if the value is missing or of another type.
    pub fn test_value(&self, value: RecordValue) -> Option<bool> {
        match (self, value) {
            (ColumnCondition::NumericLessOrEqual { threshold, .. }, RecordValue::Number(v)) => Some(v <= *threshold),
            (ColumnCondition::NumericGreater { threshold, .. }, RecordValue::Number(v)) => Some(v > *threshold),
            (ColumnCondition::NominalIn { values, negated, .. }, RecordValue::Category(v)) => {
                Some(values.contains(v as usize) != *negated)
            }
            (ColumnCondition::NominalEquals { value, .. }, RecordValue::Category(v)) => Some(v == *value),
            (ColumnCondition::BitEquals { bit, .. }, RecordValue::Bit(v)) => Some(v == *bit),
            _ => None,
        }
    }

    #[inline]
    pub fn test(&self, value: RecordValue) -> bool {
        self.test_value(value).unwrap_or_else(|| self.accepts_missing())
    }

    pub fn describe(&self, meta: &TreeMetaData) -> String {
        let name = meta
            .columns
            .get(self.column())
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("x{}", self.column()));
        let nominal = |v: u32| {
            meta.columns
                .get(self.column())
                .and_then(|c| c.nominal_values.get(v as usize))
                .cloned()
                .unwrap_or_else(|| v.to_string())
        };
        let text = match self {
            ColumnCondition::NumericLessOrEqual { threshold, .. } => format!("{} <= {}", name, threshold),
            ColumnCondition::NumericGreater { threshold, .. } => format!("{} > {}", name, threshold),
            ColumnCondition::NominalIn { values, negated, .. } => {
                let set: Vec<String> = values.ones().map(|v| nominal(v as u32)).collect();
                let op = if *negated { "not in" } else { "in" };
                format!("{} {} {{{}}}", name, op, set.join(", "))
            }
            ColumnCondition::NominalEquals { value, .. } => format!("{} = {}", name, nominal(*value)),
            ColumnCondition::BitEquals { bit, .. } => format!("{} = {}", name, u8::from(*bit)),
        };
        if self.accepts_missing() {
            format!("{} or missing", text)
        } else {
            text
        }
    }
}

impl Display for ColumnCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe(&TreeMetaData::default()))
    }
}

/// Condition leading from a parent to a child node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeCondition {
    Root,
    Column(ColumnCondition),
    /// Primary condition followed by surrogates, the first condition with a present value decides.
    /// If every value is missing `default_response` is used.
    Surrogate {
        conditions: Vec<ColumnCondition>,
        default_response: bool,
    },
}

impl NodeCondition {
    fn test_with(&self, value_of: impl Fn(usize) -> RecordValue) -> bool {
        match self {
            NodeCondition::Root => true,
            NodeCondition::Column(c) => c.test(value_of(c.column())),
            NodeCondition::Surrogate {
                conditions,
                default_response,
            } => conditions
                .iter()
                .find_map(|c| c.test_value(value_of(c.column())))
                .unwrap_or(*default_response),
        }
    }

    pub fn test(&self, record: &PredictorRecord) -> bool {
        self.test_with(|c| record.get(c))
    }

    pub fn test_row(&self, data: &TreeData, row: usize) -> bool {
        self.test_with(|c| data.column(c).value(row))
    }

    /// Column of the primary condition.
    pub fn column(&self) -> Option<usize> {
        match self {
            NodeCondition::Root => None,
            NodeCondition::Column(c) => Some(c.column()),
            NodeCondition::Surrogate { conditions, .. } => conditions.first().map(|c| c.column()),
        }
    }

    pub fn describe(&self, meta: &TreeMetaData) -> String {
        match self {
            NodeCondition::Root => "root".to_string(),
            NodeCondition::Column(c) => c.describe(meta),
            NodeCondition::Surrogate {
                conditions,
                default_response,
            } => {
                let parts: Vec<String> = conditions.iter().map(|c| c.describe(meta)).collect();
                format!("{} (default {})", parts.join(" | "), default_response)
            }
        }
    }
}

impl Display for NodeCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe(&TreeMetaData::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset;

    #[test]
    fn test_numeric_conditions() {
        let le = ColumnCondition::NumericLessOrEqual {
            column: 0,
            threshold: 1.5,
            accepts_missing: true,
        };
        assert!(le.test(RecordValue::Number(1.5)));
        assert!(!le.test(RecordValue::Number(2.0)));
        assert!(le.test(RecordValue::Missing));
        let gt = ColumnCondition::NumericGreater {
            column: 0,
            threshold: 1.5,
            accepts_missing: false,
        };
        assert!(!gt.test(RecordValue::Missing));
        assert_eq!(gt.test_value(RecordValue::Category(1)), None);
        assert!(gt.clone().with_accepts_missing(true).accepts_missing());
    }

    #[test]
    fn test_nominal_conditions() {
        let values = bitset::from_indices(4, [1, 3]);
        let right = ColumnCondition::NominalIn {
            column: 1,
            values: values.clone(),
            negated: false,
            accepts_missing: false,
        };
        let left = ColumnCondition::NominalIn {
            column: 1,
            values,
            negated: true,
            accepts_missing: true,
        };
        for v in 0..6 {
            let value = RecordValue::Category(v);
            assert_ne!(left.test(value), right.test(value));
        }
        assert!(left.test(RecordValue::Missing));
        assert!(!right.test(RecordValue::Missing));
    }

    #[test]
    fn test_surrogate_condition() {
        let condition = NodeCondition::Surrogate {
            conditions: vec![
                ColumnCondition::NumericLessOrEqual {
                    column: 0,
                    threshold: 0.0,
                    accepts_missing: false,
                },
                ColumnCondition::BitEquals {
                    column: 1,
                    bit: true,
                    accepts_missing: false,
                },
            ],
            default_response: true,
        };
        let record = |a, b| PredictorRecord { values: vec![a, b] };
        assert!(condition.test(&record(RecordValue::Number(-1.0), RecordValue::Bit(false))));
        assert!(!condition.test(&record(RecordValue::Missing, RecordValue::Bit(false))));
        assert!(condition.test(&record(RecordValue::Missing, RecordValue::Missing)));
        assert_eq!(condition.column(), Some(0));
        assert_eq!(condition.to_string(), "x0 <= 0 | x1 = 1 (default true)");
    }
}
