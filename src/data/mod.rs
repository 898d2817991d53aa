//! Data
//!
//! Immutable columnar data the trees are learned on. A [`TreeData`] is created once through the
//! [`TreeDataBuilder`] and shared read only by every tree of an ensemble.
mod builder;
mod column;
mod target;

pub use builder::TreeDataBuilder;
pub use column::{BitColumn, ColumnKind, NominalColumn, NumericColumn, RecordValue, TreeColumn};
pub use target::{NominalTarget, NumericTarget, TargetColumn};

use crate::errors::TreeEnsembleError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Learning columns plus target.
#[derive(Debug, Clone)]
pub struct TreeData {
    columns: Arc<Vec<TreeColumn>>,
    target: Arc<TargetColumn>,
    nr_rows: usize,
}

impl TreeData {
    pub(crate) fn new(columns: Vec<TreeColumn>, target: TargetColumn) -> Result<Self, TreeEnsembleError> {
        let nr_rows = target.len();
        if nr_rows == 0 {
            return Err(TreeEnsembleError::InvalidData("the data has no rows".to_string()));
        }
        if let Some(c) = columns.iter().find(|c| c.len() != nr_rows) {
            return Err(TreeEnsembleError::InvalidData(format!(
                "column \"{}\" has {} rows, target \"{}\" has {}",
                c.name(),
                c.len(),
                target.name(),
                nr_rows
            )));
        }
        Ok(TreeData {
            columns: Arc::new(columns),
            target: Arc::new(target),
            nr_rows,
        })
    }

    /// Same columns with a different target, used by boosting to learn on residuals.
    pub fn with_target(&self, target: TargetColumn) -> Result<TreeData, TreeEnsembleError> {
        if target.len() != self.nr_rows {
            return Err(TreeEnsembleError::InvalidData(format!(
                "target \"{}\" has {} rows, expected {}",
                target.name(),
                target.len(),
                self.nr_rows
            )));
        }
        Ok(TreeData {
            columns: Arc::clone(&self.columns),
            target: Arc::new(target),
            nr_rows: self.nr_rows,
        })
    }

    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    pub fn nr_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> &TreeColumn {
        &self.columns[index]
    }

    pub fn columns(&self) -> &[TreeColumn] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn target(&self) -> &TargetColumn {
        &self.target
    }

    pub fn is_regression(&self) -> bool {
        matches!(*self.target, TargetColumn::Numeric(_))
    }

    /// Values of one row over all learning columns.
    pub fn record(&self, row: usize) -> PredictorRecord {
        PredictorRecord {
            values: self.columns.iter().map(|c| c.value(row)).collect(),
        }
    }

    pub fn meta(&self) -> TreeMetaData {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnMeta {
                name: c.name().to_string(),
                kind: c.kind(),
                nominal_values: match c {
                    TreeColumn::Nominal(n) => n.values().to_vec(),
                    _ => Vec::new(),
                },
            })
            .collect();
        let class_names = match &*self.target {
            TargetColumn::Nominal(t) => t.classes().to_vec(),
            TargetColumn::Numeric(_) => Vec::new(),
        };
        TreeMetaData {
            columns,
            target_name: self.target.name().to_string(),
            class_names,
        }
    }
}

/// Values of a single row, indexed by column.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorRecord {
    pub values: Vec<RecordValue>,
}

impl PredictorRecord {
    #[inline]
    pub fn get(&self, column: usize) -> RecordValue {
        self.values.get(column).copied().unwrap_or(RecordValue::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub kind: ColumnKind,
    pub nominal_values: Vec<String>,
}

/// Names and value tables of the data a model was learned on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeMetaData {
    pub columns: Vec<ColumnMeta>,
    pub target_name: String,
    pub class_names: Vec<String>,
}
