//! Sampler
//!
//! Row samples drawn once per tree and column samples drawn per tree or per node.
use crate::config::{ColumnSamplingMode, TreeEnsembleConfig};
use crate::signature::TreeNodeSignature;
use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// How often every row was drawn for one tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSample {
    counts: Vec<u32>,
}

impl RowSample {
    /// Every row exactly once.
    pub fn all(nr_rows: usize) -> Self {
        RowSample { counts: vec![1; nr_rows] }
    }

    pub fn from_counts(counts: Vec<u32>) -> Self {
        RowSample { counts }
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    #[inline]
    pub fn count(&self, row: usize) -> u32 {
        self.counts[row]
    }

    /// True if the row was not drawn, i.e. it is out of bag for this tree.
    #[inline]
    pub fn is_out_of_bag(&self, row: usize) -> bool {
        self.counts[row] == 0
    }

    pub fn nr_rows(&self) -> usize {
        self.counts.len()
    }

    /// Number of distinct rows drawn.
    pub fn nr_included(&self) -> usize {
        self.counts.iter().filter(|c| **c > 0).count()
    }
}

// A sampler draws the rows a new tree is learned on.
pub trait RowSampler: Send + Sync {
    fn sample(&self, rng: &mut StdRng, nr_rows: usize) -> RowSample;
}

fn sample_size(fraction: f64, nr_rows: usize) -> usize {
    ((fraction * nr_rows as f64).round() as usize).clamp(1, nr_rows.max(1))
}

/// Takes all rows.
pub struct DefaultRowSampler;

impl RowSampler for DefaultRowSampler {
    fn sample(&self, _rng: &mut StdRng, nr_rows: usize) -> RowSample {
        RowSample::all(nr_rows)
    }
}

/// Draws a fraction of the rows without replacement.
pub struct SubsetNoReplacementSampler {
    fraction: f64,
}

impl SubsetNoReplacementSampler {
    pub fn new(fraction: f64) -> Self {
        SubsetNoReplacementSampler { fraction }
    }
}

impl RowSampler for SubsetNoReplacementSampler {
    fn sample(&self, rng: &mut StdRng, nr_rows: usize) -> RowSample {
        let mut counts = vec![0; nr_rows];
        for row in rand::seq::index::sample(rng, nr_rows, sample_size(self.fraction, nr_rows)).iter() {
            counts[row] = 1;
        }
        RowSample { counts }
    }
}

/// Bootstrap, draws `fraction * nr_rows` rows with replacement.
pub struct SubsetWithReplacementSampler {
    fraction: f64,
}

impl SubsetWithReplacementSampler {
    pub fn new(fraction: f64) -> Self {
        SubsetWithReplacementSampler { fraction }
    }
}

impl RowSampler for SubsetWithReplacementSampler {
    fn sample(&self, rng: &mut StdRng, nr_rows: usize) -> RowSample {
        let mut counts = vec![0; nr_rows];
        for _ in 0..sample_size(self.fraction, nr_rows) {
            counts[rng.gen_range(0..nr_rows)] += 1;
        }
        RowSample { counts }
    }
}

/// Row sampler matching the configured data fraction and replacement.
pub fn row_sampler(config: &TreeEnsembleConfig) -> Box<dyn RowSampler> {
    if config.data_selection_with_replacement {
        Box::new(SubsetWithReplacementSampler::new(config.data_fraction))
    } else if config.data_fraction >= 1.0 {
        Box::new(DefaultRowSampler)
    } else {
        Box::new(SubsetNoReplacementSampler::new(config.data_fraction))
    }
}

/// Columns a node may split on, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSample {
    columns: Vec<usize>,
}

impl ColumnSample {
    pub fn all(nr_columns: usize) -> Self {
        ColumnSample {
            columns: (0..nr_columns).collect(),
        }
    }

    fn draw(rng: &mut StdRng, nr_columns: usize, size: usize) -> Self {
        let mut columns = rand::seq::index::sample(rng, nr_columns, size).into_vec();
        columns.sort_unstable();
        ColumnSample { columns }
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn contains(&self, column: usize) -> bool {
        self.columns.binary_search(&column).is_ok()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Decides which columns a node of one tree may split on.
#[derive(Debug)]
pub enum ColumnSampleStrategy {
    All(Arc<ColumnSample>),
    /// One sample for the whole tree.
    PerTree(Arc<ColumnSample>),
    /// A sample for every node. It only depends on the tree seed and the node signature, so the
    /// order in which nodes are built doesn't matter.
    PerNode {
        seed: u64,
        nr_columns: usize,
        size: usize,
        cache: Mutex<HashMap<Arc<TreeNodeSignature>, Arc<ColumnSample>>>,
    },
}

impl ColumnSampleStrategy {
    pub fn new(config: &TreeEnsembleConfig, nr_columns: usize, rng: &mut StdRng) -> Self {
        let size = config.column_sampling.sample_size(nr_columns);
        if config.column_sampling == ColumnSamplingMode::None || size >= nr_columns {
            ColumnSampleStrategy::All(Arc::new(ColumnSample::all(nr_columns)))
        } else if config.use_different_columns_at_each_node {
            ColumnSampleStrategy::PerNode {
                seed: rng.gen::<u64>(),
                nr_columns,
                size,
                cache: Mutex::new(HashMap::new()),
            }
        } else {
            ColumnSampleStrategy::PerTree(Arc::new(ColumnSample::draw(rng, nr_columns, size)))
        }
    }

    pub fn column_sample(&self, signature: &Arc<TreeNodeSignature>) -> Arc<ColumnSample> {
        match self {
            ColumnSampleStrategy::All(sample) | ColumnSampleStrategy::PerTree(sample) => Arc::clone(sample),
            ColumnSampleStrategy::PerNode {
                seed,
                nr_columns,
                size,
                cache,
            } => {
                let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                let sample = cache.entry(Arc::clone(signature)).or_insert_with(|| {
                    let mut rng = StdRng::seed_from_u64(seed ^ signature.stable_hash());
                    Arc::new(ColumnSample::draw(&mut rng, *nr_columns, *size))
                });
                Arc::clone(sample)
            }
        }
    }
}
