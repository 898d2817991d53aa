//! Splitter
//!
//! Search for the best split of a node on a single column. The scans are generic over the target
//! statistics so classification and regression share one implementation per column type.
mod bit;
mod candidate;
mod nominal;
mod numeric;

pub use candidate::{NominalPartition, SplitCandidate, SplitKind};

use crate::config::{MissingValueHandling, TreeEnsembleConfig};
use crate::constants::EPSILON;
use crate::data::{NominalTarget, NumericTarget, TreeColumn};
use crate::impurity::{ClassificationPriors, RegressionPriors, SplitCriterion};
use crate::memberships::DataMemberships;
use rand::rngs::StdRng;
use rand::Rng;

/// Gains closer than this are considered equal.
const TIE_TOLERANCE: f64 = 1e-12;

/// Split search parameters taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitSettings {
    pub criterion: SplitCriterion,
    pub min_child_size: f64,
    pub missing_value_handling: MissingValueHandling,
    pub use_average_split_points: bool,
    pub use_binary_nominal_splits: bool,
}

impl SplitSettings {
    pub fn from_config(config: &TreeEnsembleConfig) -> Self {
        SplitSettings {
            criterion: config.split_criterion,
            min_child_size: config.effective_min_child_size(),
            missing_value_handling: config.missing_value_handling,
            use_average_split_points: config.use_average_split_points,
            use_binary_nominal_splits: config.use_binary_nominal_splits,
        }
    }

    fn learns_missing_direction(&self) -> bool {
        self.missing_value_handling == MissingValueHandling::Learned
    }
}

/// Picks uniformly among candidates with equal gain: the k-th tie replaces the incumbent with
/// probability 1/k.
#[derive(Debug, Clone)]
pub struct TieBreaker {
    best: f64,
    ties: u32,
}

impl Default for TieBreaker {
    fn default() -> Self {
        TieBreaker::new()
    }
}

impl TieBreaker {
    pub fn new() -> Self {
        TieBreaker {
            best: f64::NEG_INFINITY,
            ties: 0,
        }
    }

    /// True if `gain` becomes the new best.
    pub fn offer(&mut self, gain: f64, rng: &mut StdRng) -> bool {
        if gain > self.best + TIE_TOLERANCE {
            self.best = gain;
            self.ties = 1;
            true
        } else if gain >= self.best - TIE_TOLERANCE {
            self.ties += 1;
            rng.gen_range(0..self.ties) == 0
        } else {
            false
        }
    }
}

/// Target statistics of a set of rows that can be added up and scored.
pub(crate) trait TargetStats: Clone {
    /// Statistics of no rows.
    fn empty(&self) -> Self;
    fn add_row(&mut self, row: usize, weight: f64);
    fn add(&mut self, other: &Self);
    fn subtract(&self, other: &Self) -> Self;
    fn weight(&self) -> f64;
    /// Score of these rows as the parent of a split.
    fn score(&self) -> f64;
    /// Gain of splitting a parent with `parent_score` into `parts`.
    fn gain(&self, parent_score: f64, parts: &[&Self]) -> f64;
    /// Key to order nominal values by, if an ordered scan finds the optimal binary partition.
    fn ordering_key(&self) -> Option<f64>;
}

#[derive(Debug, Clone)]
pub(crate) struct ClassStats<'a> {
    target: &'a NominalTarget,
    criterion: SplitCriterion,
    distribution: Vec<f64>,
    weight: f64,
}

impl<'a> ClassStats<'a> {
    pub(crate) fn from_priors(target: &'a NominalTarget, priors: &ClassificationPriors) -> Self {
        ClassStats {
            target,
            criterion: priors.criterion(),
            distribution: priors.distribution().to_vec(),
            weight: priors.total_weight(),
        }
    }
}

impl TargetStats for ClassStats<'_> {
    fn empty(&self) -> Self {
        ClassStats {
            target: self.target,
            criterion: self.criterion,
            distribution: vec![0.0; self.distribution.len()],
            weight: 0.0,
        }
    }

    #[inline]
    fn add_row(&mut self, row: usize, weight: f64) {
        self.distribution[self.target.value(row)] += weight;
        self.weight += weight;
    }

    fn add(&mut self, other: &Self) {
        for (a, b) in self.distribution.iter_mut().zip(&other.distribution) {
            *a += b;
        }
        self.weight += other.weight;
    }

    fn subtract(&self, other: &Self) -> Self {
        ClassStats {
            target: self.target,
            criterion: self.criterion,
            distribution: self
                .distribution
                .iter()
                .zip(&other.distribution)
                .map(|(a, b)| (a - b).max(0.0))
                .collect(),
            weight: (self.weight - other.weight).max(0.0),
        }
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self) -> f64 {
        self.criterion.partition_impurity(&self.distribution, self.weight)
    }

    fn gain(&self, parent_score: f64, parts: &[&Self]) -> f64 {
        let distributions: Vec<&[f64]> = parts.iter().map(|p| p.distribution.as_slice()).collect();
        self.criterion.split_gain(parent_score, &distributions)
    }

    fn ordering_key(&self) -> Option<f64> {
        if self.distribution.len() == 2 && self.weight > 0.0 {
            Some(self.distribution[0] / self.weight)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RegStats<'a> {
    target: &'a NumericTarget,
    y_sum: f64,
    weight: f64,
}

impl<'a> RegStats<'a> {
    pub(crate) fn from_priors(target: &'a NumericTarget, priors: &RegressionPriors) -> Self {
        RegStats {
            target,
            y_sum: priors.y_sum,
            weight: priors.total_weight,
        }
    }
}

impl TargetStats for RegStats<'_> {
    fn empty(&self) -> Self {
        RegStats {
            target: self.target,
            y_sum: 0.0,
            weight: 0.0,
        }
    }

    #[inline]
    fn add_row(&mut self, row: usize, weight: f64) {
        self.y_sum += self.target.value(row) * weight;
        self.weight += weight;
    }

    fn add(&mut self, other: &Self) {
        self.y_sum += other.y_sum;
        self.weight += other.weight;
    }

    fn subtract(&self, other: &Self) -> Self {
        RegStats {
            target: self.target,
            y_sum: self.y_sum - other.y_sum,
            weight: (self.weight - other.weight).max(0.0),
        }
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(&self) -> f64 {
        RegressionPriors::criterion(self.y_sum, self.weight)
    }

    // Reduction of the sum of squared deviations.
    fn gain(&self, parent_score: f64, parts: &[&Self]) -> f64 {
        parts
            .iter()
            .map(|p| RegressionPriors::criterion(p.y_sum, p.weight))
            .sum::<f64>()
            - parent_score
    }

    fn ordering_key(&self) -> Option<f64> {
        if self.weight > 0.0 {
            Some(self.y_sum / self.weight)
        } else {
            None
        }
    }
}

/// Evaluate a binary partition of the present rows with `missing` rows either routed by the gain or,
/// unless learned, to the heavier child. Returns gain and whether missing rows go left.
pub(crate) fn evaluate_binary<S: TargetStats>(
    parent_score: f64,
    left: &S,
    right: &S,
    missing: &S,
    settings: &SplitSettings,
) -> Option<(f64, bool)> {
    let valid = |l: &S, r: &S| {
        l.weight() > 0.0
            && r.weight() > 0.0
            && l.weight() >= settings.min_child_size
            && r.weight() >= settings.min_child_size
    };
    if settings.learns_missing_direction() && missing.weight() > 0.0 {
        let mut with_left = left.clone();
        with_left.add(missing);
        let mut with_right = right.clone();
        with_right.add(missing);
        let go_left = valid(&with_left, right).then(|| left.gain(parent_score, &[&with_left, right]));
        let go_right = valid(left, &with_right).then(|| left.gain(parent_score, &[left, &with_right]));
        match (go_left, go_right) {
            (Some(l), Some(r)) if r > l => Some((r, false)),
            (Some(l), _) => Some((l, true)),
            (None, Some(r)) => Some((r, false)),
            (None, None) => None,
        }
    } else if valid(left, right) {
        Some((left.gain(parent_score, &[left, right]), left.weight() >= right.weight()))
    } else {
        None
    }
}

/// Score of the parent: all rows if missing rows take part in the gain, the present rows otherwise.
pub(crate) fn parent_score<S: TargetStats>(node: &S, present: &S, missing: &S, settings: &SplitSettings) -> f64 {
    if missing.weight() <= 0.0 || settings.learns_missing_direction() {
        node.score()
    } else {
        present.score()
    }
}

#[inline]
pub(crate) fn is_valid_gain(gain: f64) -> bool {
    gain > EPSILON
}

pub(crate) fn best_split<S: TargetStats>(
    column: &TreeColumn,
    column_index: usize,
    memberships: &DataMemberships,
    node: &S,
    settings: &SplitSettings,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    match column {
        TreeColumn::Numeric(c) => numeric::best_split(c, column_index, memberships, node, settings, rng),
        TreeColumn::Nominal(c) => nominal::best_split(c, column_index, memberships, node, settings, rng),
        TreeColumn::Bit(c) => bit::best_split(c, column_index, memberships, node, settings),
    }
}

/// Best split of the node's rows on `column` for a nominal target.
pub fn best_split_classification(
    column: &TreeColumn,
    column_index: usize,
    memberships: &DataMemberships,
    priors: &ClassificationPriors,
    target: &NominalTarget,
    settings: &SplitSettings,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let node = ClassStats::from_priors(target, priors);
    best_split(column, column_index, memberships, &node, settings, rng)
}

/// Best split of the node's rows on `column` for a numeric target.
pub fn best_split_regression(
    column: &TreeColumn,
    column_index: usize,
    memberships: &DataMemberships,
    priors: &RegressionPriors,
    target: &NumericTarget,
    settings: &SplitSettings,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let node = RegStats::from_priors(target, priors);
    best_split(column, column_index, memberships, &node, settings, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_tie_breaker_uniform() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut wins = [0usize; 3];
        for _ in 0..3000 {
            let mut ties = TieBreaker::new();
            let mut best = 0;
            for (i, gain) in [0.5, 0.5, 0.5].iter().enumerate() {
                if ties.offer(*gain, &mut rng) {
                    best = i;
                }
            }
            wins[best] += 1;
        }
        // each of the three tied candidates wins about a third of the time
        assert!(wins.iter().all(|w| *w > 850 && *w < 1150), "{:?}", wins);
    }

    #[test]
    fn test_tie_breaker_better_wins() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ties = TieBreaker::new();
        assert!(ties.offer(0.1, &mut rng));
        assert!(ties.offer(0.2, &mut rng));
        assert!(!ties.offer(0.15, &mut rng));
    }
}
