//! Configuration
//!
//! Parameters of the bagging and boosting learners. All settings are plain serde structs with builder style
//! setters. [`TreeEnsembleConfig::validate`] catches invalid values and invalid combinations before any tree
//! is grown.
use crate::data::{TargetColumn, TreeData};
use crate::errors::TreeEnsembleError;
use crate::impurity::SplitCriterion;
use crate::utils::{validate_float_parameter, validate_open_closed_parameter, validate_positive_float_parameter};
use log::info;
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Routing of rows whose value in the split column is missing.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MissingValueHandling {
    /// Missing rows follow the child that received more weight.
    #[default]
    Majority,
    /// Backup splits on other columns route missing rows, majority as last resort.
    Surrogate,
    /// The split search tries missing rows on both sides and keeps the better direction.
    Learned,
}

/// Number of columns considered when splitting.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub enum ColumnSamplingMode {
    /// All columns.
    None,
    /// Fraction of the columns.
    Linear(f64),
    /// Square root of the number of columns.
    #[default]
    SquareRoot,
    /// Fixed number of columns.
    Absolute(usize),
}

impl ColumnSamplingMode {
    /// Number of columns to draw out of `n_columns`, clamped to `[1, n_columns]`.
    pub fn sample_size(&self, n_columns: usize) -> usize {
        let size = match self {
            ColumnSamplingMode::None => n_columns,
            ColumnSamplingMode::Linear(fraction) => (fraction * n_columns as f64).round() as usize,
            ColumnSamplingMode::SquareRoot => (n_columns as f64).sqrt().floor() as usize,
            ColumnSamplingMode::Absolute(n) => *n,
        };
        size.clamp(1, n_columns.max(1))
    }
}

/// Loss minimized by gradient boosting of regression targets.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BoostingLoss {
    #[default]
    SquaredError,
    AbsoluteError,
    Huber,
}

fn default_max_depth() -> Option<usize> {
    None
}
fn default_min_node_size() -> Option<f64> {
    None
}
fn default_min_child_size() -> Option<f64> {
    None
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_data_fraction() -> f64 {
    1.0
}
fn default_nr_models() -> usize {
    100
}
fn default_nr_iterations() -> usize {
    100
}
fn default_learning_rate() -> f64 {
    0.1
}
fn default_alpha() -> f64 {
    0.9
}

/// Configuration of a single tree and of the bagging ensemble.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TreeEnsembleConfig {
    /// Regression trees for a numeric target, classification trees otherwise.
    pub is_regression: bool,
    /// Depth at which nodes become leaves, the root has depth 0. None for unlimited depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<usize>,
    /// Nodes with less weight are not split.
    #[serde(default = "default_min_node_size")]
    pub min_node_size: Option<f64>,
    /// Both children of a split need at least this weight.
    #[serde(default = "default_min_child_size")]
    pub min_child_size: Option<f64>,
    /// Impurity measure for classification trees.
    #[serde(default)]
    pub split_criterion: SplitCriterion,
    /// Numeric thresholds halfway between adjacent values instead of at the lower value.
    #[serde(default = "default_true")]
    pub use_average_split_points: bool,
    /// Binary splits for nominal columns, otherwise one child per value.
    #[serde(default = "default_true")]
    pub use_binary_nominal_splits: bool,
    #[serde(default)]
    pub missing_value_handling: MissingValueHandling,
    #[serde(default)]
    pub column_sampling: ColumnSamplingMode,
    /// Draw a new column sample at every node instead of once per tree.
    #[serde(default = "default_true")]
    pub use_different_columns_at_each_node: bool,
    /// Fraction of rows drawn for each tree.
    #[serde(default = "default_data_fraction")]
    pub data_fraction: f64,
    /// Bootstrap rows instead of drawing a subset.
    #[serde(default = "default_true")]
    pub data_selection_with_replacement: bool,
    /// Number of trees in a bagging ensemble.
    #[serde(default = "default_nr_models")]
    pub nr_models: usize,
    /// Seed of the random stream, None to draw one.
    pub seed: Option<u64>,
    /// Column the root is forced to split on.
    pub hard_coded_root_column: Option<String>,
    /// Build sibling subtrees of classification trees in parallel.
    #[serde(default = "default_false")]
    pub parallel_node_building: bool,
    /// Number of threads for parallel tasks.
    pub num_threads: Option<usize>,
}

impl TreeEnsembleConfig {
    pub fn classification() -> Self {
        TreeEnsembleConfig {
            is_regression: false,
            max_depth: None,
            min_node_size: None,
            min_child_size: None,
            split_criterion: SplitCriterion::Gini,
            use_average_split_points: true,
            use_binary_nominal_splits: true,
            missing_value_handling: MissingValueHandling::Majority,
            column_sampling: ColumnSamplingMode::SquareRoot,
            use_different_columns_at_each_node: true,
            data_fraction: 1.0,
            data_selection_with_replacement: true,
            nr_models: 100,
            seed: None,
            hard_coded_root_column: None,
            parallel_node_building: false,
            num_threads: None,
        }
    }

    pub fn regression() -> Self {
        TreeEnsembleConfig {
            is_regression: true,
            ..TreeEnsembleConfig::classification()
        }
    }

    /// Set the maximum depth.
    /// * `max_depth` - Depth at which nodes become leaves, None for unlimited.
    pub fn set_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn set_min_node_size(mut self, min_node_size: Option<f64>) -> Self {
        self.min_node_size = min_node_size;
        self
    }

    pub fn set_min_child_size(mut self, min_child_size: Option<f64>) -> Self {
        self.min_child_size = min_child_size;
        self
    }

    pub fn set_split_criterion(mut self, split_criterion: SplitCriterion) -> Self {
        self.split_criterion = split_criterion;
        self
    }

    pub fn set_use_average_split_points(mut self, use_average_split_points: bool) -> Self {
        self.use_average_split_points = use_average_split_points;
        self
    }

    pub fn set_use_binary_nominal_splits(mut self, use_binary_nominal_splits: bool) -> Self {
        self.use_binary_nominal_splits = use_binary_nominal_splits;
        self
    }

    pub fn set_missing_value_handling(mut self, missing_value_handling: MissingValueHandling) -> Self {
        self.missing_value_handling = missing_value_handling;
        self
    }

    pub fn set_column_sampling(mut self, column_sampling: ColumnSamplingMode) -> Self {
        self.column_sampling = column_sampling;
        self
    }

    pub fn set_use_different_columns_at_each_node(mut self, value: bool) -> Self {
        self.use_different_columns_at_each_node = value;
        self
    }

    /// Set the row sampling.
    /// * `data_fraction` - Fraction of the rows drawn for each tree.
    /// * `with_replacement` - Bootstrap instead of subset selection.
    pub fn set_row_sampling(mut self, data_fraction: f64, with_replacement: bool) -> Self {
        self.data_fraction = data_fraction;
        self.data_selection_with_replacement = with_replacement;
        self
    }

    pub fn set_nr_models(mut self, nr_models: usize) -> Self {
        self.nr_models = nr_models;
        self
    }

    pub fn set_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_hard_coded_root_column(mut self, column: Option<&str>) -> Self {
        self.hard_coded_root_column = column.map(String::from);
        self
    }

    pub fn set_parallel_node_building(mut self, parallel_node_building: bool) -> Self {
        self.parallel_node_building = parallel_node_building;
        self
    }

    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Minimum node weight actually applied, twice the child size if only that one is set.
    pub fn effective_min_node_size(&self) -> f64 {
        match (self.min_node_size, self.min_child_size) {
            (Some(node), _) => node,
            (None, Some(child)) => 2.0 * child,
            (None, None) => 0.0,
        }
    }

    pub fn effective_min_child_size(&self) -> f64 {
        self.min_child_size.unwrap_or(0.0)
    }

    /// The configured seed, or a fresh one drawn from the thread local generator.
    pub fn resolve_seed(&self) -> u64 {
        match self.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen::<u64>();
                info!("no seed configured, using {}", seed);
                seed
            }
        }
    }

    /// Check parameter values and combinations that don't depend on the data.
    pub fn validate(&self) -> Result<(), TreeEnsembleError> {
        if self.max_depth == Some(0) {
            return Err(TreeEnsembleError::InvalidParameter(
                "max_depth".to_string(),
                "a value larger than 0 or None".to_string(),
                "0".to_string(),
            ));
        }
        if let Some(node) = self.min_node_size {
            validate_positive_float_parameter(node, "min_node_size")?;
        }
        if let Some(child) = self.min_child_size {
            validate_positive_float_parameter(child, "min_child_size")?;
            if let Some(node) = self.min_node_size {
                if child > node / 2.0 {
                    return Err(TreeEnsembleError::InvalidConfiguration(format!(
                        "min_child_size ({}) must not exceed half of min_node_size ({})",
                        child, node
                    )));
                }
            }
        }
        validate_open_closed_parameter(self.data_fraction, 0.0, 1.0, "data_fraction")?;
        match self.column_sampling {
            ColumnSamplingMode::Linear(fraction) => {
                validate_open_closed_parameter(fraction, 0.0, 1.0, "column_sampling")?;
            }
            ColumnSamplingMode::Absolute(0) => {
                return Err(TreeEnsembleError::InvalidParameter(
                    "column_sampling".to_string(),
                    "at least one column".to_string(),
                    "0".to_string(),
                ));
            }
            _ => (),
        }
        if self.nr_models == 0 {
            return Err(TreeEnsembleError::InvalidParameter(
                "nr_models".to_string(),
                "a value larger than 0".to_string(),
                "0".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(TreeEnsembleError::InvalidParameter(
                "num_threads".to_string(),
                "a value larger than 0 or None".to_string(),
                "0".to_string(),
            ));
        }
        if self.missing_value_handling == MissingValueHandling::Surrogate && !self.use_binary_nominal_splits {
            return Err(TreeEnsembleError::InvalidConfiguration(
                "surrogate splits require binary nominal splits".to_string(),
            ));
        }
        Ok(())
    }

    /// Check that the configuration fits the data it is applied to.
    pub fn validate_for(&self, data: &TreeData) -> Result<(), TreeEnsembleError> {
        self.validate()?;
        match (self.is_regression, data.target()) {
            (true, TargetColumn::Nominal(t)) => {
                return Err(TreeEnsembleError::InvalidConfiguration(format!(
                    "regression configuration applied to nominal target \"{}\"",
                    t.name
                )))
            }
            (false, TargetColumn::Numeric(t)) => {
                return Err(TreeEnsembleError::InvalidConfiguration(format!(
                    "classification configuration applied to numeric target \"{}\"",
                    t.name
                )))
            }
            _ => (),
        }
        if let Some(name) = &self.hard_coded_root_column {
            if data.column_index(name).is_none() {
                return Err(TreeEnsembleError::InvalidConfiguration(format!(
                    "root column \"{}\" is not part of the data",
                    name
                )));
            }
        }
        if data.nr_columns() == 0 {
            return Err(TreeEnsembleError::InvalidData("no learning columns".to_string()));
        }
        Ok(())
    }
}

impl Default for TreeEnsembleConfig {
    fn default() -> Self {
        TreeEnsembleConfig::classification()
    }
}

/// Configuration of gradient boosted trees.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GradientBoostingConfig {
    /// Settings of the individual regression trees.
    pub tree: TreeEnsembleConfig,
    #[serde(default = "default_nr_iterations")]
    pub nr_iterations: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default)]
    pub loss: BoostingLoss,
    /// Quantile of the absolute residuals used as the Huber transition point.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        GradientBoostingConfig {
            tree: TreeEnsembleConfig::regression()
                .set_max_depth(Some(4))
                .set_column_sampling(ColumnSamplingMode::None)
                .set_row_sampling(1.0, false),
            nr_iterations: 100,
            learning_rate: 0.1,
            loss: BoostingLoss::SquaredError,
            alpha: 0.9,
        }
    }
}

impl GradientBoostingConfig {
    pub fn set_nr_iterations(mut self, nr_iterations: usize) -> Self {
        self.nr_iterations = nr_iterations;
        self
    }

    pub fn set_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn set_loss(mut self, loss: BoostingLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn set_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn set_tree(mut self, tree: TreeEnsembleConfig) -> Self {
        self.tree = tree;
        self
    }

    pub fn validate(&self) -> Result<(), TreeEnsembleError> {
        // Trees of every boosting variant are regression trees on residuals.
        let tree = TreeEnsembleConfig {
            is_regression: true,
            ..self.tree.clone()
        };
        tree.validate()?;
        if self.nr_iterations == 0 {
            return Err(TreeEnsembleError::InvalidParameter(
                "nr_iterations".to_string(),
                "a value larger than 0".to_string(),
                "0".to_string(),
            ));
        }
        validate_open_closed_parameter(self.learning_rate, 0.0, 1.0, "learning_rate")?;
        validate_float_parameter(self.alpha, f64::MIN_POSITIVE, 1.0 - f64::EPSILON, "alpha")?;
        Ok(())
    }
}

/// IO
pub trait ModelIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TreeEnsembleError> {
        fs::write(path, self.json_dump()?).map_err(|e| TreeEnsembleError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json object
    fn json_dump(&self) -> Result<String, TreeEnsembleError> {
        serde_json::to_string(self).map_err(|e| TreeEnsembleError::UnableToWrite(e.to_string()))
    }

    /// Load from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, TreeEnsembleError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| TreeEnsembleError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load from.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, TreeEnsembleError> {
        let json_str = fs::read_to_string(path).map_err(|e| TreeEnsembleError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ModelIO for TreeEnsembleConfig {}
impl ModelIO for GradientBoostingConfig {}
