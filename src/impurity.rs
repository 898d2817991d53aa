//! Impurity
//!
//! Impurity measures and the target statistics ("priors") of the rows in a node.
use crate::constants::EPSILON;
use crate::data::{NominalTarget, NumericTarget};
use crate::memberships::DataMemberships;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SplitCriterion {
    /// `1 - Σ p_i²`
    #[default]
    Gini,
    /// Entropy reduction.
    InformationGain,
    /// Entropy reduction divided by the entropy of the partition itself.
    InformationGainRatio,
}

fn entropy(counts: &[f64], total: f64) -> f64 {
    counts
        .iter()
        .filter(|c| **c > 0.0)
        .map(|c| {
            let p = c / total;
            -p * p.log2()
        })
        .sum()
}

impl SplitCriterion {
    /// Impurity of one partition with class weights `counts` summing to `total`.
    pub fn partition_impurity(&self, counts: &[f64], total: f64) -> f64 {
        if total < EPSILON {
            return 0.0;
        }
        match self {
            SplitCriterion::Gini => 1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>(),
            SplitCriterion::InformationGain | SplitCriterion::InformationGainRatio => entropy(counts, total),
        }
    }

    /// Weighted average of the partition impurities.
    pub fn post_split_impurity(&self, impurities: &[f64], weights: &[f64], total: f64) -> f64 {
        if total < EPSILON {
            return 0.0;
        }
        impurities.iter().zip(weights).map(|(i, w)| i * w / total).sum()
    }

    /// Gain of a split, `prior` minus the post split impurity (normalized by split information for the ratio).
    pub fn gain(&self, prior: f64, post: f64, weights: &[f64], total: f64) -> f64 {
        let gain = prior - post;
        match self {
            SplitCriterion::InformationGainRatio => {
                let split_info = entropy(weights, total);
                if split_info < EPSILON {
                    0.0
                } else {
                    gain / split_info
                }
            }
            _ => gain,
        }
    }

    /// Gain of splitting rows with impurity `prior` into partitions with class weights `partitions`.
    pub fn split_gain(&self, prior: f64, partitions: &[&[f64]]) -> f64 {
        let weights: Vec<f64> = partitions.iter().map(|p| p.iter().sum()).collect();
        let total: f64 = weights.iter().sum();
        let impurities: Vec<f64> = partitions
            .iter()
            .zip(&weights)
            .map(|(p, w)| self.partition_impurity(p, *w))
            .collect();
        let post = self.post_split_impurity(&impurities, &weights, total);
        self.gain(prior, post, &weights, total)
    }
}

/// Class distribution of the rows in a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPriors {
    distribution: Vec<f64>,
    total_weight: f64,
    prior_impurity: f64,
    criterion: SplitCriterion,
}

impl ClassificationPriors {
    pub fn new(distribution: Vec<f64>, criterion: SplitCriterion) -> Self {
        let total_weight = distribution.iter().sum();
        let prior_impurity = criterion.partition_impurity(&distribution, total_weight);
        ClassificationPriors {
            distribution,
            total_weight,
            prior_impurity,
            criterion,
        }
    }

    pub fn from_memberships(target: &NominalTarget, memberships: &DataMemberships, criterion: SplitCriterion) -> Self {
        let mut distribution = vec![0.0; target.nr_classes()];
        for e in memberships.entries() {
            distribution[target.value(e.original)] += e.weight;
        }
        ClassificationPriors::new(distribution, criterion)
    }

    pub fn distribution(&self) -> &[f64] {
        &self.distribution
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn prior_impurity(&self) -> f64 {
        self.prior_impurity
    }

    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Class with the largest weight, the lowest index wins ties.
    pub fn majority_class(&self) -> usize {
        let mut best = 0;
        for (i, w) in self.distribution.iter().enumerate() {
            if *w > self.distribution[best] {
                best = i;
            }
        }
        best
    }

    pub fn probabilities(&self) -> Vec<f64> {
        if self.total_weight < EPSILON {
            return vec![0.0; self.distribution.len()];
        }
        self.distribution.iter().map(|w| w / self.total_weight).collect()
    }
}

/// Weighted sums of a numeric target in a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegressionPriors {
    pub y_sum: f64,
    pub y_sum_squares: f64,
    pub total_weight: f64,
}

impl RegressionPriors {
    pub fn from_memberships(target: &NumericTarget, memberships: &DataMemberships) -> Self {
        let mut priors = RegressionPriors::default();
        for e in memberships.entries() {
            priors.add(target.value(e.original), e.weight);
        }
        priors
    }

    #[inline]
    pub fn add(&mut self, y: f64, weight: f64) {
        self.y_sum += y * weight;
        self.y_sum_squares += y * y * weight;
        self.total_weight += weight;
    }

    pub fn mean(&self) -> f64 {
        if self.total_weight < EPSILON {
            0.0
        } else {
            self.y_sum / self.total_weight
        }
    }

    /// Sum of squared deviations from the weighted mean.
    pub fn sum_squared_deviation(&self) -> f64 {
        if self.total_weight < EPSILON {
            return 0.0;
        }
        (self.y_sum_squares - self.y_sum * self.y_sum / self.total_weight).max(0.0)
    }

    /// `y_sum² / weight`, the part of the squared deviation that a split can change.
    #[inline]
    pub fn criterion(y_sum: f64, weight: f64) -> f64 {
        if weight < EPSILON {
            0.0
        } else {
            y_sum * y_sum / weight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_gini() {
        let g = SplitCriterion::Gini;
        assert_relative_eq!(g.partition_impurity(&[5.0, 5.0], 10.0), 0.5);
        assert_relative_eq!(g.partition_impurity(&[10.0, 0.0], 10.0), 0.0);
        assert_eq!(g.partition_impurity(&[0.0, 0.0], 0.0), 0.0);
        // perfect split of a balanced node
        assert_relative_eq!(g.split_gain(0.5, &[&[5.0, 0.0], &[0.0, 5.0]]), 0.5);
    }

    #[test]
    fn test_entropy_criteria() {
        let ig = SplitCriterion::InformationGain;
        assert_relative_eq!(ig.partition_impurity(&[5.0, 5.0], 10.0), 1.0);
        assert_relative_eq!(ig.split_gain(1.0, &[&[5.0, 0.0], &[0.0, 5.0]]), 1.0);
        let ratio = SplitCriterion::InformationGainRatio;
        // split information of an even binary partition is 1
        assert_relative_eq!(ratio.split_gain(1.0, &[&[5.0, 0.0], &[0.0, 5.0]]), 1.0);
        assert_relative_eq!(ratio.split_gain(1.0, &[&[5.0, 5.0]]), 0.0);
    }

    #[test]
    fn test_classification_priors() {
        let p = ClassificationPriors::new(vec![1.0, 3.0, 3.0], SplitCriterion::Gini);
        assert_eq!(p.majority_class(), 1);
        assert_eq!(p.total_weight(), 7.0);
        assert_relative_eq!(p.probabilities()[0], 1.0 / 7.0);
        let empty = ClassificationPriors::new(vec![0.0, 0.0], SplitCriterion::Gini);
        assert_eq!(empty.prior_impurity(), 0.0);
    }

    #[test]
    fn test_regression_priors() {
        let mut p = RegressionPriors::default();
        p.add(1.0, 1.0);
        p.add(3.0, 1.0);
        assert_relative_eq!(p.mean(), 2.0);
        assert_relative_eq!(p.sum_squared_deviation(), 2.0);
        assert_eq!(RegressionPriors::default().sum_squared_deviation(), 0.0);
    }

    proptest! {
        #[test]
        fn test_gini_gain_bounds(
            left in prop::collection::vec(0u32..50, 2..6),
            right_seed in prop::collection::vec(0u32..50, 6),
        ) {
            let left: Vec<f64> = left.iter().map(|c| f64::from(*c)).collect();
            let right: Vec<f64> = right_seed.iter().take(left.len()).map(|c| f64::from(*c)).collect();
            let parent: Vec<f64> = left.iter().zip(&right).map(|(l, r)| l + r).collect();
            let total: f64 = parent.iter().sum();
            let criterion = SplitCriterion::Gini;
            let prior = criterion.partition_impurity(&parent, total);
            let gain = criterion.split_gain(prior, &[&left, &right]);
            prop_assert!(gain >= -1e-12);
            prop_assert!(gain <= 1.0);
        }
    }
}
