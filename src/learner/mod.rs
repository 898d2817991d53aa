//! Learner
//!
//! Recursive growing of a single tree. The recursion is shared by classification and regression
//! trees, the target specific parts live behind [`NodeLearner`].
mod classification;
mod regression;

pub use classification::TreeLearnerClassification;
pub use regression::{LeafRows, TreeLearnerRegression};

use fixedbitset::FixedBitSet;
use crate::condition::NodeCondition;
use crate::config::{MissingValueHandling, TreeEnsembleConfig};
use crate::constants::{MAX_CHILDREN, PARALLEL_NODE_MIN_ROWS};
use crate::data::{TreeColumn, TreeData};
use crate::errors::TreeEnsembleError;
use crate::memberships::DataMemberships;
use crate::progress::ProgressMonitor;
use crate::sampler::{ColumnSample, ColumnSampleStrategy, RowSample};
use crate::signature::{SignatureFactory, TreeNodeSignature};
use crate::splitter::{is_valid_gain, SplitCandidate, SplitSettings, TieBreaker};
use crate::surrogate::{default_direction_split, learn_surrogates};
use crate::tree::{assemble, TreeModel, TreeNode};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::Arc;

/// A learned tree together with the columns its root could choose from.
#[derive(Debug, Clone)]
pub struct LearnedTree<N> {
    pub tree: TreeModel<N>,
    pub root_column_sample: Arc<ColumnSample>,
}

/// Target specific parts of growing a tree.
pub(crate) trait NodeLearner: Sync {
    type Node: TreeNode + Send;
    type Priors: Send;

    fn priors(&self, memberships: &DataMemberships) -> Self::Priors;
    fn node_weight(&self, priors: &Self::Priors) -> f64;
    /// Nothing left to gain by splitting.
    fn is_pure(&self, priors: &Self::Priors) -> bool;
    fn best_split(
        &self,
        column: &TreeColumn,
        column_index: usize,
        memberships: &DataMemberships,
        priors: &Self::Priors,
        settings: &SplitSettings,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate>;
    fn leaf(
        &self,
        signature: Arc<TreeNodeSignature>,
        condition: NodeCondition,
        priors: Self::Priors,
        memberships: &DataMemberships,
    ) -> Self::Node;
    fn internal(
        &self,
        signature: Arc<TreeNodeSignature>,
        condition: NodeCondition,
        priors: Self::Priors,
        gain: f64,
    ) -> Self::Node;
}

/// Column index of the configured root column.
pub(crate) fn resolve_root_column(
    data: &TreeData,
    config: &TreeEnsembleConfig,
) -> Result<Option<usize>, TreeEnsembleError> {
    match &config.hard_coded_root_column {
        None => Ok(None),
        Some(name) => data.column_index(name).map(Some).ok_or_else(|| {
            TreeEnsembleError::InvalidConfiguration(format!("root column \"{}\" is not part of the data", name))
        }),
    }
}

struct TreeBuilder<'a, L> {
    learner: &'a L,
    data: &'a TreeData,
    config: &'a TreeEnsembleConfig,
    settings: SplitSettings,
    signatures: &'a SignatureFactory,
    columns: ColumnSampleStrategy,
    monitor: &'a dyn ProgressMonitor,
    root_column: Option<usize>,
    parallel: bool,
}

/// Grow one tree on the rows of `sample`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn grow_tree<L: NodeLearner>(
    learner: &L,
    data: &TreeData,
    config: &TreeEnsembleConfig,
    signatures: &SignatureFactory,
    root_column: Option<usize>,
    sample: &RowSample,
    rng: &mut StdRng,
    monitor: &dyn ProgressMonitor,
    parallel: bool,
) -> Result<LearnedTree<L::Node>, TreeEnsembleError> {
    if sample.nr_rows() != data.nr_rows() {
        return Err(TreeEnsembleError::InvalidData(format!(
            "row sample covers {} rows, data has {}",
            sample.nr_rows(),
            data.nr_rows()
        )));
    }
    monitor.check_canceled()?;
    let columns = ColumnSampleStrategy::new(config, data.nr_columns(), rng);
    let root = signatures.root();
    let root_column_sample = columns.column_sample(&root);
    let builder = TreeBuilder {
        learner,
        data,
        config,
        settings: SplitSettings::from_config(config),
        signatures,
        columns,
        monitor,
        root_column,
        parallel,
    };
    let mut forbidden = FixedBitSet::with_capacity(data.nr_columns());
    let nodes = builder.build(
        DataMemberships::root(sample),
        root,
        NodeCondition::Root,
        &mut forbidden,
        rng,
    )?;
    Ok(LearnedTree {
        tree: TreeModel::from_nodes(nodes),
        root_column_sample,
    })
}

struct ChildTask {
    memberships: DataMemberships,
    signature: Arc<TreeNodeSignature>,
    condition: NodeCondition,
    seed: u64,
}

impl<L: NodeLearner> TreeBuilder<'_, L> {
    fn build(
        &self,
        memberships: DataMemberships,
        signature: Arc<TreeNodeSignature>,
        condition: NodeCondition,
        forbidden: &mut FixedBitSet,
        rng: &mut StdRng,
    ) -> Result<Vec<L::Node>, TreeEnsembleError> {
        self.monitor.check_canceled()?;
        let priors = self.learner.priors(&memberships);
        let at_max_depth = self.config.max_depth.map_or(false, |max| signature.depth() >= max);
        if at_max_depth
            || self.learner.node_weight(&priors) < self.config.effective_min_node_size()
            || self.learner.is_pure(&priors)
        {
            return Ok(vec![self.learner.leaf(signature, condition, priors, &memberships)]);
        }

        let column_sample = self.columns.column_sample(&signature);
        let best = match self.find_best_split(&signature, &column_sample, &memberships, &priors, forbidden, rng) {
            Some(best) => best,
            None => return Ok(vec![self.learner.leaf(signature, condition, priors, &memberships)]),
        };
        if best.nr_children() > MAX_CHILDREN {
            return Err(TreeEnsembleError::StructuralOverflow {
                signature: signature.to_string(),
                children: best.nr_children(),
                max: MAX_CHILDREN,
            });
        }

        let (markers, conditions) =
            if self.settings.missing_value_handling == MissingValueHandling::Surrogate && best.nr_children() == 2 {
                let split = learn_surrogates(self.data, &memberships, &best, &column_sample, &self.settings, rng);
                trace!("surrogates of {}: {:?}", signature, split.rules());
                let [left, right] = split.child_markers;
                (vec![left, right], split.child_conditions.to_vec())
            } else {
                default_direction_split(self.data, &memberships, &best)
            };

        let mut tasks = Vec::with_capacity(markers.len());
        for (index, (marker, condition)) in markers.iter().zip(conditions).enumerate() {
            tasks.push(ChildTask {
                memberships: memberships.create_child(marker),
                signature: self.signatures.child(&signature, index)?,
                condition,
                seed: rng.gen::<u64>(),
            });
        }
        drop(memberships);

        let exhausted = !best.can_column_be_split_further();
        let subtrees = if self.parallel && tasks.iter().map(|t| t.memberships.row_count()).sum::<usize>() >= PARALLEL_NODE_MIN_ROWS {
            let mut child_forbidden = forbidden.clone();
            if exhausted {
                child_forbidden.insert(best.column);
            }
            tasks
                .into_par_iter()
                .map(|task| {
                    let mut forbidden = child_forbidden.clone();
                    self.build_child(task, &mut forbidden)
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            if exhausted {
                forbidden.insert(best.column);
            }
            let subtrees = tasks
                .into_iter()
                .map(|task| self.build_child(task, forbidden))
                .collect::<Result<Vec<_>, _>>();
            if exhausted {
                forbidden.set(best.column, false);
            }
            subtrees?
        };

        let node = self.learner.internal(signature, condition, priors, best.gain);
        Ok(assemble(node, subtrees))
    }

    fn build_child(&self, task: ChildTask, forbidden: &mut FixedBitSet) -> Result<Vec<L::Node>, TreeEnsembleError> {
        let mut rng = StdRng::seed_from_u64(task.seed);
        self.build(task.memberships, task.signature, task.condition, forbidden, &mut rng)
    }

    fn find_best_split(
        &self,
        signature: &TreeNodeSignature,
        column_sample: &ColumnSample,
        memberships: &DataMemberships,
        priors: &L::Priors,
        forbidden: &FixedBitSet,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let candidates: Vec<usize> = match self.root_column {
            Some(column) if signature.is_root() => vec![column],
            _ => column_sample
                .columns()
                .iter()
                .copied()
                .filter(|c| !forbidden.contains(*c))
                .collect(),
        };
        let mut ties = TieBreaker::new();
        let mut best = None;
        for column in candidates {
            let split = self.learner.best_split(
                self.data.column(column),
                column,
                memberships,
                priors,
                &self.settings,
                rng,
            );
            if let Some(split) = split.filter(|s| is_valid_gain(s.gain)) {
                if ties.offer(split.gain, rng) {
                    best = Some(split);
                }
            }
        }
        if best.is_none() && signature.is_root() {
            if let Some(column) = self.root_column {
                debug!(
                    "root column \"{}\" has no valid split, the tree is a single leaf",
                    self.data.column(column).name()
                );
            }
        }
        best
    }
}
