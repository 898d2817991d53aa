use crate::condition::NodeCondition;
use crate::data::TreeMetaData;
use crate::impurity::{ClassificationPriors, RegressionPriors};
use crate::signature::TreeNodeSignature;
use crate::utils::fmt_vec_output;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Common view of classification and regression nodes stored in a tree arena.
pub trait TreeNode {
    fn signature(&self) -> &Arc<TreeNodeSignature>;
    fn condition(&self) -> &NodeCondition;
    /// Arena indices of the children, empty for leaves.
    fn children(&self) -> &[usize];
    fn set_children(&mut self, children: Vec<usize>);
    /// Gain of the split below this node, None for leaves.
    fn split_gain(&self) -> Option<f64>;

    /// One line rendering with column and class names.
    fn describe(&self, meta: &TreeMetaData) -> String;

    fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Move the node and its children to an arena that starts `offset` entries earlier.
    fn shift_children(&mut self, offset: usize) {
        let shifted = self.children().iter().map(|c| c + offset).collect();
        self.set_children(shifted);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationNode {
    pub signature: Arc<TreeNodeSignature>,
    pub condition: NodeCondition,
    pub priors: ClassificationPriors,
    pub majority_class: usize,
    pub split_gain: Option<f64>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionNode {
    pub signature: Arc<TreeNodeSignature>,
    pub condition: NodeCondition,
    pub priors: RegressionPriors,
    pub mean: f64,
    pub split_gain: Option<f64>,
    pub children: Vec<usize>,
}

impl TreeNode for ClassificationNode {
    fn signature(&self) -> &Arc<TreeNodeSignature> {
        &self.signature
    }
    fn condition(&self) -> &NodeCondition {
        &self.condition
    }
    fn children(&self) -> &[usize] {
        &self.children
    }
    fn set_children(&mut self, children: Vec<usize>) {
        self.children = children;
    }
    fn split_gain(&self) -> Option<f64> {
        self.split_gain
    }
    fn describe(&self, meta: &TreeMetaData) -> String {
        let class = meta
            .class_names
            .get(self.majority_class)
            .cloned()
            .unwrap_or_else(|| self.majority_class.to_string());
        format!(
            "{}: {} => {} ({:.4} of {:.1})",
            self.signature,
            self.condition.describe(meta),
            class,
            self.priors.probabilities().get(self.majority_class).copied().unwrap_or(0.0),
            self.priors.total_weight()
        )
    }
}

impl TreeNode for RegressionNode {
    fn signature(&self) -> &Arc<TreeNodeSignature> {
        &self.signature
    }
    fn condition(&self) -> &NodeCondition {
        &self.condition
    }
    fn children(&self) -> &[usize] {
        &self.children
    }
    fn set_children(&mut self, children: Vec<usize>) {
        self.children = children;
    }
    fn split_gain(&self) -> Option<f64> {
        self.split_gain
    }
    fn describe(&self, meta: &TreeMetaData) -> String {
        format!(
            "{}: {} => {:.4} ({:.1})",
            self.signature,
            self.condition.describe(meta),
            self.mean,
            self.priors.total_weight
        )
    }
}

impl fmt::Display for ClassificationNode {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:[{}] class={},distribution=[{}]",
            self.signature,
            self.condition,
            self.majority_class,
            fmt_vec_output(self.priors.distribution())
        )?;
        if let Some(gain) = self.split_gain {
            write!(f, ",gain={:.4}", gain)?;
        }
        Ok(())
    }
}

impl fmt::Display for RegressionNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:[{}] mean={:.4},cover={}",
            self.signature, self.condition, self.mean, self.priors.total_weight
        )?;
        if let Some(gain) = self.split_gain {
            write!(f, ",gain={:.4}", gain)?;
        }
        Ok(())
    }
}
