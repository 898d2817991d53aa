use super::{grow_tree, resolve_root_column, LearnedTree, NodeLearner};
use crate::condition::NodeCondition;
use crate::config::TreeEnsembleConfig;
use crate::constants::EPSILON;
use crate::data::{NominalTarget, TargetColumn, TreeColumn, TreeData};
use crate::errors::TreeEnsembleError;
use crate::impurity::{ClassificationPriors, SplitCriterion};
use crate::memberships::DataMemberships;
use crate::progress::ProgressMonitor;
use crate::sampler::RowSample;
use crate::signature::{SignatureFactory, TreeNodeSignature};
use crate::splitter::{best_split_classification, SplitCandidate, SplitSettings};
use crate::tree::ClassificationNode;
use rand::rngs::StdRng;
use std::sync::Arc;

struct ClassificationNodes<'a> {
    target: &'a NominalTarget,
    criterion: SplitCriterion,
}

impl NodeLearner for ClassificationNodes<'_> {
    type Node = ClassificationNode;
    type Priors = ClassificationPriors;

    fn priors(&self, memberships: &DataMemberships) -> ClassificationPriors {
        ClassificationPriors::from_memberships(self.target, memberships, self.criterion)
    }

    fn node_weight(&self, priors: &ClassificationPriors) -> f64 {
        priors.total_weight()
    }

    fn is_pure(&self, priors: &ClassificationPriors) -> bool {
        priors.prior_impurity() < EPSILON
    }

    fn best_split(
        &self,
        column: &TreeColumn,
        column_index: usize,
        memberships: &DataMemberships,
        priors: &ClassificationPriors,
        settings: &SplitSettings,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        best_split_classification(column, column_index, memberships, priors, self.target, settings, rng)
    }

    fn leaf(
        &self,
        signature: Arc<TreeNodeSignature>,
        condition: NodeCondition,
        priors: ClassificationPriors,
        _memberships: &DataMemberships,
    ) -> ClassificationNode {
        ClassificationNode {
            signature,
            condition,
            majority_class: priors.majority_class(),
            priors,
            split_gain: None,
            children: Vec::new(),
        }
    }

    fn internal(
        &self,
        signature: Arc<TreeNodeSignature>,
        condition: NodeCondition,
        priors: ClassificationPriors,
        gain: f64,
    ) -> ClassificationNode {
        ClassificationNode {
            signature,
            condition,
            majority_class: priors.majority_class(),
            priors,
            split_gain: Some(gain),
            children: Vec::new(),
        }
    }
}

/// Learns classification trees for a nominal target.
pub struct TreeLearnerClassification<'a> {
    data: &'a TreeData,
    config: &'a TreeEnsembleConfig,
    signatures: &'a SignatureFactory,
    nodes: ClassificationNodes<'a>,
    root_column: Option<usize>,
}

impl<'a> TreeLearnerClassification<'a> {
    /// Fails if the configuration is invalid or doesn't fit the data.
    pub fn new(
        data: &'a TreeData,
        config: &'a TreeEnsembleConfig,
        signatures: &'a SignatureFactory,
    ) -> Result<Self, TreeEnsembleError> {
        config.validate_for(data)?;
        let target = match data.target() {
            TargetColumn::Nominal(target) => target,
            TargetColumn::Numeric(target) => {
                return Err(TreeEnsembleError::InvalidConfiguration(format!(
                    "classification trees need a nominal target, \"{}\" is numeric",
                    target.name
                )))
            }
        };
        Ok(TreeLearnerClassification {
            data,
            config,
            signatures,
            nodes: ClassificationNodes {
                target,
                criterion: config.split_criterion,
            },
            root_column: resolve_root_column(data, config)?,
        })
    }

    /// Learn a tree on the rows of `sample`, sibling subtrees are built in parallel if configured.
    pub fn learn_single_tree(
        &self,
        sample: &RowSample,
        rng: &mut StdRng,
        monitor: &dyn ProgressMonitor,
    ) -> Result<LearnedTree<ClassificationNode>, TreeEnsembleError> {
        grow_tree(
            &self.nodes,
            self.data,
            self.config,
            self.signatures,
            self.root_column,
            sample,
            rng,
            monitor,
            self.config.parallel_node_building,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnSamplingMode, MissingValueHandling};
    use crate::condition::ColumnCondition;
    use crate::data::{PredictorRecord, RecordValue, TreeDataBuilder};
    use crate::progress::{CancelableMonitor, NoopMonitor};
    use crate::tree::{TreeModel, TreeNode};
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    fn config() -> TreeEnsembleConfig {
        TreeEnsembleConfig::classification()
            .set_column_sampling(ColumnSamplingMode::None)
            .set_min_node_size(Some(1.0))
    }

    fn correlated_data() -> TreeData {
        let x: Vec<f64> = (0..100).map(f64::from).collect();
        let y: Vec<&str> = (0..100).map(|i| if i < 50 { "a" } else { "b" }).collect();
        TreeDataBuilder::new()
            .add_numeric_column("x", x)
            .set_nominal_target("y", &y)
            .build()
            .unwrap()
    }

    fn noisy_data(n: usize, seed: u64) -> TreeData {
        let mut rng = StdRng::seed_from_u64(seed);
        let x1: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
        let x2: Vec<Option<&str>> = (0..n)
            .map(|_| Some(["red", "green", "blue", "white"][rng.gen_range(0..4)]))
            .collect();
        let x3: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let y: Vec<&str> = (0..n)
            .map(|i| {
                if x1[i] + 3.0 * x3[i] + rng.gen_range(0.0..2.0) > 6.0 {
                    "yes"
                } else if x2[i] == Some("red") {
                    "maybe"
                } else {
                    "no"
                }
            })
            .collect();
        TreeDataBuilder::new()
            .add_numeric_column("x1", x1)
            .add_nominal_column("x2", &x2)
            .add_numeric_column("x3", x3)
            .set_nominal_target("y", &y)
            .build()
            .unwrap()
    }

    fn learn(data: &TreeData, config: &TreeEnsembleConfig, seed: u64) -> TreeModel<ClassificationNode> {
        let signatures = SignatureFactory::new();
        let learner = TreeLearnerClassification::new(data, config, &signatures).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        learner
            .learn_single_tree(&RowSample::all(data.nr_rows()), &mut rng, &NoopMonitor)
            .unwrap()
            .tree
    }

    fn assert_partitions(tree: &TreeModel<ClassificationNode>) {
        for node in tree.nodes.iter().filter(|n| !n.is_leaf()) {
            let children: f64 = node
                .children
                .iter()
                .map(|c| tree.nodes[*c].priors.total_weight())
                .sum();
            assert_relative_eq!(children, node.priors.total_weight());
        }
    }

    #[test]
    fn test_single_split_on_correlated_column() {
        let data = correlated_data();
        let config = config().set_split_criterion(SplitCriterion::InformationGain);
        let tree = learn(&data, &config, 0);
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.root().condition, NodeCondition::Root);
        assert_relative_eq!(tree.root().split_gain.unwrap(), 1.0, epsilon = 1e-9);
        for leaf in tree.leaves() {
            assert_relative_eq!(leaf.priors.prior_impurity(), 0.0);
            assert_eq!(leaf.condition.column(), Some(0));
        }
        let record = |v| PredictorRecord {
            values: vec![RecordValue::Number(v)],
        };
        assert_eq!(tree.predict(&record(10.0)).0, 0);
        assert_eq!(tree.predict(&record(80.0)).0, 1);
    }

    #[test]
    fn test_gini_gain_equals_prior_for_pure_children() {
        let data = correlated_data();
        let tree = learn(&data, &config(), 0);
        assert_relative_eq!(tree.root().split_gain.unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_children_partition_parent() {
        let data = noisy_data(300, 1);
        let tree = learn(&data, &config(), 5);
        assert!(tree.nodes.len() > 3);
        assert_partitions(&tree);
    }

    #[test]
    fn test_parallel_equals_sequential() {
        let data = noisy_data(400, 2);
        let sequential = config().set_column_sampling(ColumnSamplingMode::Absolute(2));
        let parallel = sequential.clone().set_parallel_node_building(true);
        assert_eq!(learn(&data, &sequential, 9), learn(&data, &parallel, 9));
    }

    #[test]
    fn test_same_seed_same_tree() {
        let data = noisy_data(200, 3);
        let config = config().set_column_sampling(ColumnSamplingMode::Absolute(1));
        assert_eq!(learn(&data, &config, 4), learn(&data, &config, 4));
    }

    #[test]
    fn test_max_depth() {
        let data = noisy_data(300, 4);
        let stump = learn(&data, &config().set_max_depth(Some(1)), 0);
        assert_eq!(stump.depth, 1);
        let deeper = learn(&data, &config().set_max_depth(Some(3)), 0);
        assert!(deeper.depth <= 3);
    }

    #[test]
    fn test_multiway_column_not_reused_below() {
        let data = noisy_data(300, 5);
        let config = config().set_use_binary_nominal_splits(false);
        let tree = learn(&data, &config, 0);
        for node in &tree.nodes {
            if let NodeCondition::Column(ColumnCondition::NominalEquals { column, .. }) = node.condition {
                let path = node.signature.path();
                // Nodes below a multiway split never split on its column again.
                let below = tree
                    .nodes
                    .iter()
                    .filter(|n| n.signature.path().len() > path.len() && n.signature.path().starts_with(path));
                for n in below {
                    assert!(!matches!(
                        n.condition,
                        NodeCondition::Column(ColumnCondition::NominalEquals { column: c, .. }) if c == column
                    ));
                }
            }
        }
    }

    #[test]
    fn test_surrogates_route_missing_rows() {
        let n = 200;
        let mut rng = StdRng::seed_from_u64(6);
        let x2: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
        let x1: Vec<f64> = (0..n)
            .map(|i| if i % 10 == 0 { f64::NAN } else { x2[i] + rng.gen_range(-0.05..0.05) })
            .collect();
        let y: Vec<&str> = (0..n).map(|i| if x2[i] > 0.5 { "hi" } else { "lo" }).collect();
        let data = TreeDataBuilder::new()
            .add_numeric_column("x1", x1)
            .add_numeric_column("x2", x2)
            .set_nominal_target("y", &y)
            .build()
            .unwrap();
        let config = config()
            .set_missing_value_handling(MissingValueHandling::Surrogate)
            .set_hard_coded_root_column(Some("x1"))
            .set_max_depth(Some(1));
        let tree = learn(&data, &config, 0);
        match &tree.nodes[1].condition {
            NodeCondition::Surrogate { conditions, .. } => {
                assert_eq!(conditions[0].column(), 0);
                assert!(conditions.len() > 1);
            }
            other => panic!("expected surrogate condition, got {:?}", other),
        }
        let rows: f64 = tree.leaves().map(|l| l.priors.total_weight()).sum();
        assert_relative_eq!(rows, n as f64);
        assert_partitions(&tree);
        for row in 0..n {
            let leaf = tree.find_node_for_row(&data, row);
            assert!(tree.nodes[leaf].is_leaf());
        }
    }

    #[test]
    fn test_hard_coded_root_column() {
        let data = noisy_data(300, 7);
        let config = config().set_hard_coded_root_column(Some("x3"));
        let tree = learn(&data, &config, 0);
        assert_eq!(tree.nodes[1].condition.column(), Some(2));
    }

    #[test]
    fn test_hard_coded_root_without_split_is_leaf() {
        let y: Vec<&str> = (0..20).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
        let data = TreeDataBuilder::new()
            .add_numeric_column("constant", vec![1.0; 20])
            .add_numeric_column("x", (0..20).map(f64::from).collect())
            .set_nominal_target("y", &y)
            .build()
            .unwrap();
        let config = config().set_hard_coded_root_column(Some("constant"));
        let tree = learn(&data, &config, 0);
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn test_cancel() {
        let data = noisy_data(100, 8);
        let config = config();
        let signatures = SignatureFactory::new();
        let learner = TreeLearnerClassification::new(&data, &config, &signatures).unwrap();
        let monitor = CancelableMonitor::new();
        monitor.cancel();
        let mut rng = StdRng::seed_from_u64(0);
        let result = learner.learn_single_tree(&RowSample::all(100), &mut rng, &monitor);
        assert!(matches!(result, Err(TreeEnsembleError::Canceled)));
    }

    #[test]
    fn test_too_many_children() {
        let values: Vec<Option<String>> = (0..300).map(|i| Some(format!("v{}", i))).collect();
        let y: Vec<&str> = (0..300).map(|i| if i % 3 == 0 { "a" } else { "b" }).collect();
        let data = TreeDataBuilder::new()
            .add_nominal_column("id", &values)
            .set_nominal_target("y", &y)
            .build()
            .unwrap();
        let config = config().set_use_binary_nominal_splits(false);
        let signatures = SignatureFactory::new();
        let learner = TreeLearnerClassification::new(&data, &config, &signatures).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let result = learner.learn_single_tree(&RowSample::all(300), &mut rng, &NoopMonitor);
        match result {
            Err(TreeEnsembleError::StructuralOverflow { signature, children, max }) => {
                assert_eq!(signature, TreeNodeSignature::root().to_string());
                assert_eq!(children, 300);
                assert_eq!(max, 256);
            }
            Err(other) => panic!("expected a structural overflow, got {}", other),
            Ok(_) => panic!("expected a structural overflow"),
        }
    }

    #[test]
    fn test_numeric_target_rejected() {
        let data = TreeDataBuilder::new()
            .add_numeric_column("x", vec![1.0, 2.0])
            .set_numeric_target("y", vec![1.0, 2.0])
            .build()
            .unwrap();
        let config = config();
        let signatures = SignatureFactory::new();
        assert!(matches!(
            TreeLearnerClassification::new(&data, &config, &signatures),
            Err(TreeEnsembleError::InvalidConfiguration(_))
        ));
    }
}
