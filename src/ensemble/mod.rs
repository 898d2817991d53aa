//! Ensemble
//!
//! Bagging of independently learned trees. Every tree gets its own row sample and random seed, both drawn
//! up front from one master stream so the ensemble only depends on the configured seed. Trees are learned
//! concurrently on a thread pool, the number of trees in flight is bounded by a counting semaphore.
mod model;

pub use model::{
    ClassPrediction, SplitStatistics, TreeEnsembleClassificationModel, TreeEnsembleLearnerResult, TreeEnsembleModel,
    TreeEnsembleRegressionModel,
};

use crate::config::TreeEnsembleConfig;
use crate::constants::ADMISSION_FACTOR;
use crate::data::TreeData;
use crate::errors::TreeEnsembleError;
use crate::learner::{LearnedTree, TreeLearnerClassification, TreeLearnerRegression};
use crate::progress::ProgressMonitor;
use crate::sampler::{row_sampler, RowSample};
use crate::signature::SignatureFactory;
use crate::tree::{ClassificationNode, RegressionNode};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, OnceLock, PoisonError};

/// Counting semaphore limiting the trees in flight.
struct Semaphore {
    permits: Mutex<usize>,
    released: Condvar,
}

struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    fn new(permits: usize) -> Self {
        Semaphore {
            permits: Mutex::new(permits),
            released: Condvar::new(),
        }
    }

    fn acquire(&self) -> Permit<'_> {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *permits == 0 {
            permits = self.released.wait(permits).unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
        Permit { semaphore: self }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        *self.semaphore.permits.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.semaphore.released.notify_one();
    }
}

/// First failure of a bagging run, later failures are dropped.
#[derive(Default)]
struct FirstFailure {
    failed: AtomicBool,
    error: Mutex<Option<TreeEnsembleError>>,
}

impl FirstFailure {
    fn record(&self, index: usize, error: TreeEnsembleError) {
        let error = if error.is_canceled() {
            TreeEnsembleError::Canceled
        } else {
            TreeEnsembleError::TreeFailed {
                index,
                source: Box::new(error),
            }
        };
        if self
            .failed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
        }
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn into_error(self) -> Option<TreeEnsembleError> {
        self.error.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Number of threads of the learning pool.
fn pool_size(config: &TreeEnsembleConfig) -> usize {
    config
        .num_threads
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
}

/// Learns bagged ensembles of classification or regression trees.
pub struct TreeEnsembleLearner<'a> {
    config: &'a TreeEnsembleConfig,
    data: &'a TreeData,
}

impl<'a> TreeEnsembleLearner<'a> {
    /// Fails if the configuration is invalid or doesn't fit the data.
    pub fn new(config: &'a TreeEnsembleConfig, data: &'a TreeData) -> Result<Self, TreeEnsembleError> {
        config.validate_for(data)?;
        Ok(TreeEnsembleLearner { config, data })
    }

    pub fn learn_classification(
        &self,
        monitor: &dyn ProgressMonitor,
    ) -> Result<TreeEnsembleLearnerResult<ClassificationNode>, TreeEnsembleError> {
        let signatures = SignatureFactory::new();
        let learner = TreeLearnerClassification::new(self.data, self.config, &signatures)?;
        self.learn(monitor, |sample, rng, monitor| learner.learn_single_tree(sample, rng, monitor))
    }

    pub fn learn_regression(
        &self,
        monitor: &dyn ProgressMonitor,
    ) -> Result<TreeEnsembleLearnerResult<RegressionNode>, TreeEnsembleError> {
        let signatures = SignatureFactory::new();
        let learner = TreeLearnerRegression::new(self.data, self.config, &signatures)?;
        self.learn(monitor, |sample, rng, monitor| learner.learn_single_tree(sample, rng, monitor))
    }

    fn learn<N, F>(
        &self,
        monitor: &dyn ProgressMonitor,
        learn_tree: F,
    ) -> Result<TreeEnsembleLearnerResult<N>, TreeEnsembleError>
    where
        N: Send + Sync,
        F: Fn(&RowSample, &mut StdRng, &dyn ProgressMonitor) -> Result<LearnedTree<N>, TreeEnsembleError> + Sync,
    {
        let (row_samples, learned) = bag(self.config, self.data.nr_rows(), monitor, learn_tree)?;
        let (trees, root_column_samples) = learned
            .into_iter()
            .map(|l| (l.tree, l.root_column_sample))
            .unzip();
        Ok(TreeEnsembleLearnerResult {
            model: TreeEnsembleModel {
                config: self.config.clone(),
                meta: self.data.meta(),
                trees,
            },
            row_samples,
            root_column_samples,
        })
    }
}

/// Learn `config.nr_models` trees with `learn_tree` and return them in tree order together with their row
/// samples. The first failing tree fails the whole run once all trees in flight have finished.
pub(crate) fn bag<N, F>(
    config: &TreeEnsembleConfig,
    nr_rows: usize,
    monitor: &dyn ProgressMonitor,
    learn_tree: F,
) -> Result<(Vec<RowSample>, Vec<LearnedTree<N>>), TreeEnsembleError>
where
    N: Send + Sync,
    F: Fn(&RowSample, &mut StdRng, &dyn ProgressMonitor) -> Result<LearnedTree<N>, TreeEnsembleError> + Sync,
{
    monitor.check_canceled()?;
    let nr_models = config.nr_models;
    let seed = config.resolve_seed();
    let mut master = StdRng::seed_from_u64(seed);
    let sampler = row_sampler(config);
    let mut row_samples = Vec::with_capacity(nr_models);
    let mut seeds = Vec::with_capacity(nr_models);
    for _ in 0..nr_models {
        row_samples.push(sampler.sample(&mut master, nr_rows));
        seeds.push(master.gen::<u64>());
    }

    let threads = pool_size(config);
    let admission = ((ADMISSION_FACTOR * threads as f64).ceil() as usize).max(1);
    info!(
        "learning {} trees on {} threads, at most {} in flight, seed {}",
        nr_models, threads, admission, seed
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| TreeEnsembleError::InvalidConfiguration(e.to_string()))?;

    let semaphore = Semaphore::new(admission);
    let slots: Vec<OnceLock<LearnedTree<N>>> = (0..nr_models).map(|_| OnceLock::new()).collect();
    let failure = FirstFailure::default();
    let finished = AtomicUsize::new(0);

    pool.in_place_scope(|scope| {
        for index in 0..nr_models {
            if failure.has_failed() {
                break;
            }
            if let Err(e) = monitor.check_canceled() {
                failure.record(index, e);
                break;
            }
            let permit = semaphore.acquire();
            let (slot, sample, seed) = (&slots[index], &row_samples[index], seeds[index]);
            let (failure, finished, learn_tree) = (&failure, &finished, &learn_tree);
            scope.spawn(move |_| {
                let _permit = permit;
                if failure.has_failed() {
                    return;
                }
                let mut rng = StdRng::seed_from_u64(seed);
                let result = learn_tree(sample, &mut rng, monitor).and_then(|tree| {
                    monitor.check_canceled()?;
                    Ok(tree)
                });
                match result {
                    Ok(tree) => {
                        let _ = slot.set(tree);
                        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                        debug!("tree {} finished ({} of {})", index, done, nr_models);
                        monitor.set_progress(
                            done as f64 / nr_models as f64,
                            &format!("learned {} of {} trees", done, nr_models),
                        );
                    }
                    Err(e) => failure.record(index, e),
                }
            });
        }
    });

    if let Some(error) = failure.into_error() {
        return Err(error);
    }
    let trees = slots
        .into_iter()
        .map(|slot| slot.into_inner().ok_or(TreeEnsembleError::Canceled))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((row_samples, trees))
}
