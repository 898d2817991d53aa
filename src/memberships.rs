//! Memberships
//!
//! Rows that reached a tree node, identified by their index in the data, together with their weights.
//! Children are derived from the parent with a marker over the parent's rows, column data is never copied.
use fixedbitset::FixedBitSet;
use crate::data::NumericColumn;
use crate::sampler::RowSample;

#[derive(Debug, Clone)]
pub struct DataMemberships {
    original_indices: Vec<usize>,
    weights: Vec<f64>,
    row_count_in_root: usize,
}

/// A row of a node as seen from one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberEntry {
    /// Position of the row within the node.
    pub local: usize,
    /// Row index in the data.
    pub original: usize,
    pub weight: f64,
}

impl DataMemberships {
    /// All rows included in the sample, in ascending row order.
    pub fn root(sample: &RowSample) -> Self {
        let (original_indices, weights): (Vec<usize>, Vec<f64>) = sample
            .counts()
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(row, c)| (row, f64::from(*c)))
            .unzip();
        let row_count_in_root = original_indices.len();
        DataMemberships {
            original_indices,
            weights,
            row_count_in_root,
        }
    }

    /// Restrict to the rows flagged in `marker`, a set over the positions of this node's rows.
    pub fn create_child(&self, marker: &FixedBitSet) -> Self {
        let (original_indices, weights) = marker
            .ones()
            .map(|local| (self.original_indices[local], self.weights[local]))
            .unzip();
        DataMemberships {
            original_indices,
            weights,
            row_count_in_root: self.row_count_in_root,
        }
    }

    /// Number of distinct rows in this node.
    pub fn row_count(&self) -> usize {
        self.original_indices.len()
    }

    pub fn row_count_in_root(&self) -> usize {
        self.row_count_in_root
    }

    pub fn original_indices(&self) -> &[usize] {
        &self.original_indices
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Rows in data order.
    pub fn entries(&self) -> impl Iterator<Item = MemberEntry> + '_ {
        self.original_indices
            .iter()
            .zip(&self.weights)
            .enumerate()
            .map(|(local, (original, weight))| MemberEntry {
                local,
                original: *original,
                weight: *weight,
            })
    }

    /// Rows ordered by their value in `column`, missing values last.
    pub fn sorted_entries(&self, column: &NumericColumn) -> Vec<MemberEntry> {
        let mut entries: Vec<MemberEntry> = self.entries().collect();
        entries.sort_unstable_by_key(|e| column.rank(e.original));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset;

    #[test]
    fn test_root_and_child() {
        let sample = RowSample::from_counts(vec![1, 0, 2, 1, 1]);
        let root = DataMemberships::root(&sample);
        assert_eq!(root.original_indices(), &[0, 2, 3, 4]);
        assert_eq!(root.weights(), &[1.0, 2.0, 1.0, 1.0]);
        assert_eq!(root.total_weight(), 5.0);

        let child = root.create_child(&bitset::from_indices(4, [1, 3]));
        assert_eq!(child.original_indices(), &[2, 4]);
        assert_eq!(child.weights(), &[2.0, 1.0]);
        assert_eq!(child.row_count(), 2);
        assert_eq!(child.row_count_in_root(), 4);
    }

    #[test]
    fn test_sorted_entries() {
        let column = NumericColumn::new("x", vec![5.0, f64::NAN, 1.0, 3.0]);
        let root = DataMemberships::root(&RowSample::all(4));
        let order: Vec<usize> = root.sorted_entries(&column).iter().map(|e| e.original).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
        let locals: Vec<usize> = root.sorted_entries(&column).iter().map(|e| e.local).collect();
        assert_eq!(locals, vec![2, 3, 0, 1]);
    }
}
