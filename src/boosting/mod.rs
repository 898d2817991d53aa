//! Boosting
//!
//! Gradient boosted regression trees. Iterations are strictly sequential, every tree is learned on the
//! pseudo residuals of the running prediction. The trees either carry one coefficient found by a line
//! search, or one coefficient per leaf keyed by the leaf's signature.
mod brent;
mod classification;
mod gradient;
mod huber;
mod loss;

pub use brent::{bracket, brent, line_search};
pub use classification::{GradientBoostingClassificationLearner, GradientBoostingClassificationModel};
pub use gradient::GradientBoostingLearner;
pub use huber::HuberBoostingLearner;

use crate::config::{GradientBoostingConfig, ModelIO, TreeEnsembleConfig};
use crate::data::{NumericTarget, PredictorRecord, TargetColumn, TreeData, TreeMetaData};
use crate::errors::TreeEnsembleError;
use crate::learner::{LeafRows, TreeLearnerRegression};
use crate::progress::ProgressMonitor;
use crate::sampler::{row_sampler, RowSampler};
use crate::signature::{SignatureFactory, TreeNodeSignature};
use crate::tree::TreeModelRegression;
use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Scaling of a boosted tree's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coefficients {
    /// The tree's leaf means times one coefficient.
    PerTree(f64),
    /// A value per leaf, the leaf means are not used.
    PerLeaf(HashMap<TreeNodeSignature, f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTree {
    pub tree: TreeModelRegression,
    pub coefficients: Coefficients,
}

impl BoostedTree {
    fn value_of_leaf(&self, index: usize) -> f64 {
        let node = &self.tree.nodes[index];
        match &self.coefficients {
            Coefficients::PerTree(c) => c * node.mean,
            Coefficients::PerLeaf(map) => map.get(node.signature.as_ref()).copied().unwrap_or(0.0),
        }
    }

    /// Output of the tree for a record, before the learning rate is applied.
    pub fn contribution(&self, record: &PredictorRecord) -> f64 {
        self.value_of_leaf(self.tree.find_node(record))
    }

    pub fn contribution_row(&self, data: &TreeData, row: usize) -> f64 {
        self.value_of_leaf(self.tree.find_node_for_row(data, row))
    }
}

/// Boosted regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingModel {
    pub config: GradientBoostingConfig,
    pub meta: TreeMetaData,
    pub initial_value: f64,
    pub trees: Vec<BoostedTree>,
    /// Mean training loss after every iteration.
    pub training_loss: Vec<f64>,
}

impl ModelIO for GradientBoostingModel {}

impl GradientBoostingModel {
    pub fn predict(&self, record: &PredictorRecord) -> f64 {
        self.initial_value
            + self.config.learning_rate * self.trees.iter().map(|t| t.contribution(record)).sum::<f64>()
    }

    pub fn nr_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Learns one regression tree per call on a replaced target, all trees share the signature factory
/// and one random stream.
pub(crate) struct ResidualTrees<'a> {
    data: &'a TreeData,
    config: TreeEnsembleConfig,
    signatures: SignatureFactory,
    sampler: Box<dyn RowSampler>,
    rng: StdRng,
}

impl<'a> ResidualTrees<'a> {
    pub(crate) fn new(data: &'a TreeData, config: &GradientBoostingConfig) -> Self {
        let config = TreeEnsembleConfig {
            is_regression: true,
            ..config.tree.clone()
        };
        let rng = StdRng::seed_from_u64(config.resolve_seed());
        ResidualTrees {
            data,
            sampler: row_sampler(&config),
            config,
            signatures: SignatureFactory::new(),
            rng,
        }
    }

    /// Learn a tree on `targets`, returns the tree and the learning rows of its leaves.
    pub(crate) fn fit(
        &mut self,
        targets: Vec<f64>,
        monitor: &dyn ProgressMonitor,
    ) -> Result<(TreeModelRegression, Vec<LeafRows>), TreeEnsembleError> {
        let data = self
            .data
            .with_target(TargetColumn::Numeric(NumericTarget::new("pseudo_residual", targets)))?;
        let learner = TreeLearnerRegression::new(&data, &self.config, &self.signatures)?;
        let sample = self.sampler.sample(&mut self.rng, data.nr_rows());
        let mut tree_rng = StdRng::seed_from_u64(self.rng.gen::<u64>());
        let (learned, leaves) = learner.learn_with_leaves(&sample, &mut tree_rng, monitor)?;
        monitor.set_progress(1.0, &format!("learned tree with {} leaves", leaves.len()));
        Ok((learned.tree, leaves))
    }
}

/// Numeric target of `data`, boosting of regression models fails for nominal targets.
pub(crate) fn numeric_target(data: &TreeData) -> Result<&NumericTarget, TreeEnsembleError> {
    match data.target() {
        TargetColumn::Numeric(target) => Ok(target),
        TargetColumn::Nominal(target) => Err(TreeEnsembleError::InvalidConfiguration(format!(
            "boosted regression needs a numeric target, \"{}\" is nominal",
            target.name
        ))),
    }
}

pub(crate) fn check_columns(data: &TreeData) -> Result<(), TreeEnsembleError> {
    if data.nr_columns() == 0 {
        Err(TreeEnsembleError::InvalidData("no learning columns".to_string()))
    } else {
        Ok(())
    }
}
