// Modules
pub mod bitset;
pub mod boosting;
pub mod condition;
pub mod config;
pub mod constants;
pub mod data;
pub mod ensemble;
pub mod errors;
pub mod impurity;
pub mod learner;
pub mod memberships;
pub mod progress;
pub mod sampler;
pub mod signature;
pub mod splitter;
pub mod surrogate;
pub mod tree;
pub mod utils;

// Individual classes, and functions
pub use boosting::{
    GradientBoostingClassificationLearner, GradientBoostingClassificationModel, GradientBoostingLearner,
    GradientBoostingModel, HuberBoostingLearner,
};
pub use config::{GradientBoostingConfig, ModelIO, TreeEnsembleConfig};
pub use data::{TreeData, TreeDataBuilder};
pub use ensemble::{TreeEnsembleClassificationModel, TreeEnsembleLearner, TreeEnsembleRegressionModel};
pub use errors::TreeEnsembleError;
