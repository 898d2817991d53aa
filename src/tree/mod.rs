//! Tree
//!
//! Learned trees are arenas of nodes in pre-order, the root at index 0. Children are referenced
//! by index.
mod node;

pub use node::{ClassificationNode, RegressionNode, TreeNode};

use crate::data::{PredictorRecord, TreeData, TreeMetaData};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeModel<N> {
    pub nodes: Vec<N>,
    pub depth: usize,
    pub n_leaves: usize,
}

pub type TreeModelClassification = TreeModel<ClassificationNode>;
pub type TreeModelRegression = TreeModel<RegressionNode>;

/// Arena of a node followed by its subtrees, every subtree an arena of its own rooted at 0.
pub(crate) fn assemble<N: TreeNode>(mut node: N, subtrees: Vec<Vec<N>>) -> Vec<N> {
    let mut nodes = Vec::with_capacity(1 + subtrees.iter().map(|s| s.len()).sum::<usize>());
    let mut children = Vec::with_capacity(subtrees.len());
    let mut offset = 1;
    for subtree in &subtrees {
        children.push(offset);
        offset += subtree.len();
    }
    node.set_children(children);
    nodes.push(node);
    for subtree in subtrees {
        let offset = nodes.len();
        for mut n in subtree {
            n.shift_children(offset);
            nodes.push(n);
        }
    }
    nodes
}

impl<N: TreeNode> TreeModel<N> {
    pub fn from_nodes(nodes: Vec<N>) -> Self {
        let depth = nodes.iter().map(|n| n.signature().depth()).max().unwrap_or(0);
        let n_leaves = nodes.iter().filter(|n| n.is_leaf()).count();
        TreeModel { nodes, depth, n_leaves }
    }

    pub fn root(&self) -> &N {
        &self.nodes[0]
    }

    fn walk(&self, accepts: impl Fn(&N) -> bool) -> usize {
        let mut current = 0;
        loop {
            let node = &self.nodes[current];
            match node.children().iter().find(|c| accepts(&self.nodes[**c])) {
                Some(child) => current = *child,
                None => return current,
            }
        }
    }

    /// Index of the node a record ends up in. That is a leaf unless no child of some node
    /// accepts the record.
    pub fn find_node(&self, record: &PredictorRecord) -> usize {
        self.walk(|n| n.condition().test(record))
    }

    pub fn find_node_for_row(&self, data: &TreeData, row: usize) -> usize {
        self.walk(|n| n.condition().test_row(data, row))
    }

    pub fn leaves(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Indented text rendering with column and class names.
    pub fn to_text(&self, meta: &TreeMetaData) -> String {
        let mut print_buffer: Vec<usize> = vec![0];
        let mut r = String::new();
        while let Some(idx) = print_buffer.pop() {
            let node = &self.nodes[idx];
            let indent = "      ".repeat(node.signature().depth());
            r += format!("{}{}\n", indent, node.describe(meta)).as_str();
            print_buffer.extend(node.children().iter().rev());
        }
        r
    }
}

impl TreeModelClassification {
    /// Majority class and class probabilities of the node the record ends up in.
    pub fn predict(&self, record: &PredictorRecord) -> (usize, Vec<f64>) {
        let node = &self.nodes[self.find_node(record)];
        (node.majority_class, node.priors.probabilities())
    }
}

impl TreeModelRegression {
    pub fn predict(&self, record: &PredictorRecord) -> f64 {
        self.nodes[self.find_node(record)].mean
    }

    pub fn predict_row(&self, data: &TreeData, row: usize) -> f64 {
        self.nodes[self.find_node_for_row(data, row)].mean
    }
}

impl<N: TreeNode + Display> Display for TreeModel<N> {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut print_buffer: Vec<usize> = vec![0];
        let mut r = String::new();
        while let Some(idx) = print_buffer.pop() {
            let node = &self.nodes[idx];
            r += format!("{}{}\n", "      ".repeat(node.signature().depth()).as_str(), node).as_str();
            print_buffer.extend(node.children().iter().rev());
        }
        write!(f, "{}", r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ColumnCondition, NodeCondition};
    use crate::data::RecordValue;
    use crate::impurity::RegressionPriors;
    use crate::signature::SignatureFactory;
    use std::sync::Arc;

    fn leaf(signature: Arc<crate::signature::TreeNodeSignature>, condition: NodeCondition, mean: f64) -> RegressionNode {
        RegressionNode {
            signature,
            condition,
            priors: RegressionPriors::default(),
            mean,
            split_gain: None,
            children: Vec::new(),
        }
    }

    fn stump() -> TreeModelRegression {
        let factory = SignatureFactory::new();
        let root = factory.root();
        let le = ColumnCondition::NumericLessOrEqual {
            column: 0,
            threshold: 1.0,
            accepts_missing: true,
        };
        let gt = ColumnCondition::NumericGreater {
            column: 0,
            threshold: 1.0,
            accepts_missing: false,
        };
        let left = leaf(factory.child(&root, 0).unwrap(), NodeCondition::Column(le), -1.0);
        let right = leaf(factory.child(&root, 1).unwrap(), NodeCondition::Column(gt), 1.0);
        let mut parent = leaf(root, NodeCondition::Root, 0.0);
        parent.split_gain = Some(2.0);
        TreeModel::from_nodes(assemble(parent, vec![vec![left], vec![right]]))
    }

    #[test]
    fn test_assemble_and_predict() {
        let tree = stump();
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.root().children, vec![1, 2]);
        assert_eq!(tree.depth, 1);
        assert_eq!(tree.n_leaves, 2);
        let record = |v| PredictorRecord { values: vec![v] };
        assert_eq!(tree.predict(&record(RecordValue::Number(0.5))), -1.0);
        assert_eq!(tree.predict(&record(RecordValue::Number(3.0))), 1.0);
        assert_eq!(tree.predict(&record(RecordValue::Missing)), -1.0);
    }

    #[test]
    fn test_nested_assemble_offsets() {
        let tree = stump();
        let factory = SignatureFactory::new();
        let root = factory.root();
        let other = leaf(factory.child(&root, 1).unwrap(), NodeCondition::Root, 5.0);
        let mut parent = leaf(root, NodeCondition::Root, 0.0);
        parent.split_gain = Some(1.0);
        let nodes = assemble(parent, vec![tree.nodes.clone(), vec![other]]);
        assert_eq!(nodes[0].children, vec![1, 4]);
        assert_eq!(nodes[1].children, vec![2, 3]);
        assert_eq!(nodes[4].mean, 5.0);
    }

    #[test]
    fn test_display() {
        let text = stump().to_string();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().starts_with("      r-0"));

        let meta = TreeMetaData {
            columns: vec![crate::data::ColumnMeta {
                name: "age".to_string(),
                kind: crate::data::ColumnKind::Numeric,
                nominal_values: Vec::new(),
            }],
            ..Default::default()
        };
        let text = stump().to_text(&meta);
        assert!(text.lines().nth(2).unwrap().contains("age > 1"));
    }
}
