use crate::config::{ModelIO, TreeEnsembleConfig};
use crate::data::{PredictorRecord, TargetColumn, TreeData, TreeMetaData};
use crate::sampler::{ColumnSample, RowSample};
use crate::tree::{ClassificationNode, RegressionNode, TreeModel, TreeNode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bagged trees with the meta data of the learning table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleModel<N> {
    pub config: TreeEnsembleConfig,
    pub meta: TreeMetaData,
    pub trees: Vec<TreeModel<N>>,
}

pub type TreeEnsembleClassificationModel = TreeEnsembleModel<ClassificationNode>;
pub type TreeEnsembleRegressionModel = TreeEnsembleModel<RegressionNode>;

impl ModelIO for TreeEnsembleClassificationModel {}
impl ModelIO for TreeEnsembleRegressionModel {}

/// Majority vote of a classification ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPrediction {
    pub class: usize,
    pub class_name: String,
    /// Share of the trees voting for each class.
    pub probabilities: Vec<f64>,
}

impl<N> TreeEnsembleModel<N> {
    pub fn nr_models(&self) -> usize {
        self.trees.len()
    }
}

fn vote(votes: &[usize]) -> usize {
    // Lowest class index wins ties.
    let mut best = 0;
    for (class, v) in votes.iter().enumerate() {
        if *v > votes[best] {
            best = class;
        }
    }
    best
}

impl TreeEnsembleClassificationModel {
    pub fn predict(&self, record: &PredictorRecord) -> ClassPrediction {
        let nr_classes = self.meta.class_names.len().max(1);
        let mut votes = vec![0usize; nr_classes];
        for tree in &self.trees {
            let (class, _) = tree.predict(record);
            if class < nr_classes {
                votes[class] += 1;
            }
        }
        let class = vote(&votes);
        let total = self.trees.len().max(1) as f64;
        ClassPrediction {
            class,
            class_name: self.meta.class_names.get(class).cloned().unwrap_or_default(),
            probabilities: votes.iter().map(|v| *v as f64 / total).collect(),
        }
    }
}

impl TreeEnsembleRegressionModel {
    /// Mean of the tree predictions.
    pub fn predict(&self, record: &PredictorRecord) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(record)).sum::<f64>() / self.trees.len() as f64
    }
}

/// Number of splits per column at the top three levels of all trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitStatistics {
    pub columns: Vec<String>,
    /// `counts[column][level]`, level 0 is the root split.
    pub counts: Vec<[usize; 3]>,
}

impl SplitStatistics {
    pub fn from_trees<N: TreeNode>(meta: &TreeMetaData, trees: &[TreeModel<N>]) -> Self {
        let mut counts = vec![[0usize; 3]; meta.columns.len()];
        for tree in trees {
            for node in tree.nodes.iter().filter(|n| !n.is_leaf()) {
                let level = node.signature().depth();
                if level >= 3 {
                    continue;
                }
                let column = node
                    .children()
                    .first()
                    .and_then(|c| tree.nodes[*c].condition().column());
                if let Some(slot) = column.and_then(|c| counts.get_mut(c)) {
                    slot[level] += 1;
                }
            }
        }
        SplitStatistics {
            columns: meta.columns.iter().map(|c| c.name.clone()).collect(),
            counts,
        }
    }

    pub fn count(&self, column: &str, level: usize) -> usize {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.counts[i].get(level).copied())
            .unwrap_or(0)
    }
}

/// Bagged model together with what every tree was learned on.
#[derive(Debug, Clone)]
pub struct TreeEnsembleLearnerResult<N> {
    pub model: TreeEnsembleModel<N>,
    /// Row sample of every tree, in tree order.
    pub row_samples: Vec<RowSample>,
    /// Columns available at the root of every tree, in tree order.
    pub root_column_samples: Vec<Arc<ColumnSample>>,
}

impl<N: TreeNode> TreeEnsembleLearnerResult<N> {
    pub fn split_statistics(&self) -> SplitStatistics {
        SplitStatistics::from_trees(&self.model.meta, &self.model.trees)
    }

    /// Trees that didn't see `row` during learning.
    fn out_of_bag_trees(&self, row: usize) -> impl Iterator<Item = &TreeModel<N>> + '_ {
        self.model
            .trees
            .iter()
            .zip(&self.row_samples)
            .filter(move |(_, s)| s.is_out_of_bag(row))
            .map(|(t, _)| t)
    }
}

impl TreeEnsembleLearnerResult<ClassificationNode> {
    /// Accuracy of the out-of-bag majority vote, None if every row was used by every tree.
    pub fn out_of_bag_accuracy(&self, data: &TreeData) -> Option<f64> {
        let target = match data.target() {
            TargetColumn::Nominal(t) => t,
            TargetColumn::Numeric(_) => return None,
        };
        let nr_classes = target.nr_classes();
        let (mut correct, mut total) = (0usize, 0usize);
        for row in 0..data.nr_rows() {
            let record = data.record(row);
            let mut votes = vec![0usize; nr_classes];
            let mut any = false;
            for tree in self.out_of_bag_trees(row) {
                let (class, _) = tree.predict(&record);
                if class < nr_classes {
                    votes[class] += 1;
                    any = true;
                }
            }
            if any {
                total += 1;
                if vote(&votes) == target.value(row) {
                    correct += 1;
                }
            }
        }
        (total > 0).then(|| correct as f64 / total as f64)
    }
}

impl TreeEnsembleLearnerResult<RegressionNode> {
    /// Mean squared error of the out-of-bag mean prediction, None if there are no out-of-bag rows.
    pub fn out_of_bag_mse(&self, data: &TreeData) -> Option<f64> {
        let target = match data.target() {
            TargetColumn::Numeric(t) => t,
            TargetColumn::Nominal(_) => return None,
        };
        let (mut sse, mut total) = (0.0, 0usize);
        for row in 0..data.nr_rows() {
            let record = data.record(row);
            let (sum, count) = self
                .out_of_bag_trees(row)
                .fold((0.0, 0usize), |(s, c), t| (s + t.predict(&record), c + 1));
            if count > 0 {
                let error = sum / count as f64 - target.value(row);
                sse += error * error;
                total += 1;
            }
        }
        (total > 0).then(|| sse / total as f64)
    }
}
