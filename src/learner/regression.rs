use super::{grow_tree, resolve_root_column, LearnedTree, NodeLearner};
use crate::condition::NodeCondition;
use crate::config::TreeEnsembleConfig;
use crate::constants::EPSILON;
use crate::data::{NumericTarget, TargetColumn, TreeColumn, TreeData};
use crate::errors::TreeEnsembleError;
use crate::impurity::RegressionPriors;
use crate::memberships::DataMemberships;
use crate::progress::ProgressMonitor;
use crate::sampler::RowSample;
use crate::signature::{SignatureFactory, TreeNodeSignature};
use crate::splitter::{best_split_regression, SplitCandidate, SplitSettings};
use crate::tree::RegressionNode;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex, PoisonError};

/// Rows of the learning data that ended up in a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafRows {
    pub signature: Arc<TreeNodeSignature>,
    pub rows: Vec<usize>,
}

struct RegressionNodes<'a> {
    target: &'a NumericTarget,
    leaves: Mutex<Vec<LeafRows>>,
}

impl NodeLearner for RegressionNodes<'_> {
    type Node = RegressionNode;
    type Priors = RegressionPriors;

    fn priors(&self, memberships: &DataMemberships) -> RegressionPriors {
        RegressionPriors::from_memberships(self.target, memberships)
    }

    fn node_weight(&self, priors: &RegressionPriors) -> f64 {
        priors.total_weight
    }

    fn is_pure(&self, priors: &RegressionPriors) -> bool {
        priors.sum_squared_deviation() < EPSILON
    }

    fn best_split(
        &self,
        column: &TreeColumn,
        column_index: usize,
        memberships: &DataMemberships,
        priors: &RegressionPriors,
        settings: &SplitSettings,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        best_split_regression(column, column_index, memberships, priors, self.target, settings, rng)
    }

    fn leaf(
        &self,
        signature: Arc<TreeNodeSignature>,
        condition: NodeCondition,
        priors: RegressionPriors,
        memberships: &DataMemberships,
    ) -> RegressionNode {
        self.leaves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LeafRows {
                signature: Arc::clone(&signature),
                rows: memberships.original_indices().to_vec(),
            });
        RegressionNode {
            signature,
            condition,
            mean: priors.mean(),
            priors,
            split_gain: None,
            children: Vec::new(),
        }
    }

    fn internal(
        &self,
        signature: Arc<TreeNodeSignature>,
        condition: NodeCondition,
        priors: RegressionPriors,
        gain: f64,
    ) -> RegressionNode {
        RegressionNode {
            signature,
            condition,
            mean: priors.mean(),
            priors,
            split_gain: Some(gain),
            children: Vec::new(),
        }
    }
}

/// Learns regression trees for a numeric target.
pub struct TreeLearnerRegression<'a> {
    data: &'a TreeData,
    config: &'a TreeEnsembleConfig,
    signatures: &'a SignatureFactory,
    target: &'a NumericTarget,
    root_column: Option<usize>,
}

impl<'a> TreeLearnerRegression<'a> {
    /// Fails if the configuration is invalid or doesn't fit the data.
    pub fn new(
        data: &'a TreeData,
        config: &'a TreeEnsembleConfig,
        signatures: &'a SignatureFactory,
    ) -> Result<Self, TreeEnsembleError> {
        config.validate_for(data)?;
        let target = match data.target() {
            TargetColumn::Numeric(target) => target,
            TargetColumn::Nominal(target) => {
                return Err(TreeEnsembleError::InvalidConfiguration(format!(
                    "regression trees need a numeric target, \"{}\" is nominal",
                    target.name
                )))
            }
        };
        Ok(TreeLearnerRegression {
            data,
            config,
            signatures,
            target,
            root_column: resolve_root_column(data, config)?,
        })
    }

    pub fn learn_single_tree(
        &self,
        sample: &RowSample,
        rng: &mut StdRng,
        monitor: &dyn ProgressMonitor,
    ) -> Result<LearnedTree<RegressionNode>, TreeEnsembleError> {
        self.learn_with_leaves(sample, rng, monitor).map(|(tree, _)| tree)
    }

    /// Learn a tree and list the rows of every leaf, ordered by leaf signature.
    pub fn learn_with_leaves(
        &self,
        sample: &RowSample,
        rng: &mut StdRng,
        monitor: &dyn ProgressMonitor,
    ) -> Result<(LearnedTree<RegressionNode>, Vec<LeafRows>), TreeEnsembleError> {
        let nodes = RegressionNodes {
            target: self.target,
            leaves: Mutex::new(Vec::new()),
        };
        let tree = grow_tree(
            &nodes,
            self.data,
            self.config,
            self.signatures,
            self.root_column,
            sample,
            rng,
            monitor,
            false,
        )?;
        let mut leaves = nodes.leaves.into_inner().unwrap_or_else(PoisonError::into_inner);
        leaves.sort_by(|a, b| a.signature.path().cmp(b.signature.path()));
        Ok((tree, leaves))
    }
}
