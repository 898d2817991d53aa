use super::{check_columns, line_search, numeric_target, BoostedTree, Coefficients, GradientBoostingModel, ResidualTrees};
use crate::config::{BoostingLoss, GradientBoostingConfig};
use crate::constants::EPSILON;
use crate::data::TreeData;
use crate::errors::TreeEnsembleError;
use crate::progress::ProgressMonitor;
use log::{info, warn};

/// Gradient boosting with one line searched coefficient per tree.
pub struct GradientBoostingLearner<'a> {
    config: &'a GradientBoostingConfig,
    data: &'a TreeData,
}

impl<'a> GradientBoostingLearner<'a> {
    pub fn new(config: &'a GradientBoostingConfig, data: &'a TreeData) -> Result<Self, TreeEnsembleError> {
        config.validate()?;
        numeric_target(data)?;
        check_columns(data)?;
        Ok(GradientBoostingLearner { config, data })
    }

    pub fn learn(&self, monitor: &dyn ProgressMonitor) -> Result<GradientBoostingModel, TreeEnsembleError> {
        let y = numeric_target(self.data)?.values();
        let n = y.len();
        let loss = self.config.loss;
        let initial_value = loss.initial_value(y);
        if y.iter().all(|v| (v - initial_value).abs() < EPSILON) {
            warn!("target is constant, boosting can't improve on the initial value");
        }
        let mut prediction = vec![initial_value; n];
        let mut trees = ResidualTrees::new(self.data, self.config);
        let mut model = GradientBoostingModel {
            config: self.config.clone(),
            meta: self.data.meta(),
            initial_value,
            trees: Vec::with_capacity(self.config.nr_iterations),
            training_loss: Vec::with_capacity(self.config.nr_iterations),
        };

        for iteration in 0..self.config.nr_iterations {
            monitor.check_canceled()?;
            let delta = match loss {
                BoostingLoss::Huber => {
                    let raw: Vec<f64> = y.iter().zip(&prediction).map(|(yi, p)| yi - p).collect();
                    BoostingLoss::huber_delta(&raw, self.config.alpha)
                }
                _ => 0.0,
            };
            let residuals = loss.pseudo_residuals(y, &prediction, delta);
            let iteration_monitor = monitor.create_sub_progress(1.0 / self.config.nr_iterations as f64);
            let (tree, _) = trees.fit(residuals, iteration_monitor.as_ref())?;
            let direction: Vec<f64> = (0..n).map(|row| tree.predict_row(self.data, row)).collect();

            let coefficient = line_search(|c| {
                let moved: Vec<f64> = prediction.iter().zip(&direction).map(|(p, d)| p + c * d).collect();
                loss.loss(y, &moved, delta)
            });
            let step = self.config.learning_rate * coefficient;
            for (p, d) in prediction.iter_mut().zip(&direction) {
                *p += step * d;
            }
            let training_loss = loss.loss(y, &prediction, delta) / n as f64;
            info!(
                "iteration {}, coefficient {:.4}, training loss {:.6}",
                iteration, coefficient, training_loss
            );
            model.trees.push(BoostedTree {
                tree,
                coefficients: Coefficients::PerTree(coefficient),
            });
            model.training_loss.push(training_loss);
            monitor.set_progress(
                (iteration + 1) as f64 / self.config.nr_iterations as f64,
                &format!("iteration {} of {}", iteration + 1, self.config.nr_iterations),
            );
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelIO, TreeEnsembleConfig};
    use crate::data::TreeDataBuilder;
    use crate::progress::{CancelableMonitor, NoopMonitor, SubProgress};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMonitor {
        fractions: Mutex<Vec<f64>>,
        sub_tasks: AtomicUsize,
    }

    impl ProgressMonitor for RecordingMonitor {
        fn check_canceled(&self) -> Result<(), TreeEnsembleError> {
            Ok(())
        }
        fn set_progress(&self, fraction: f64, _message: &str) {
            self.fractions.lock().unwrap().push(fraction);
        }
        fn create_sub_progress(&self, weight: f64) -> Box<dyn ProgressMonitor + '_> {
            self.sub_tasks.fetch_add(1, Ordering::SeqCst);
            let offset = self.fractions.lock().unwrap().last().copied().unwrap_or(0.0);
            Box::new(SubProgress::new(self, offset, weight))
        }
    }

    fn linear_data() -> TreeData {
        let mut rng = StdRng::seed_from_u64(3);
        let x: Vec<f64> = (0..100).map(|_| rng.gen_range(0.0..10.0)).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        TreeDataBuilder::new()
            .add_numeric_column("x", x)
            .set_numeric_target("y", y)
            .build()
            .unwrap()
    }

    fn sse(model: &GradientBoostingModel, data: &TreeData) -> f64 {
        let y = numeric_target(data).unwrap().values();
        (0..data.nr_rows())
            .map(|row| (model.predict(&data.record(row)) - y[row]).powi(2))
            .sum()
    }

    #[test]
    fn test_progress_per_iteration() {
        let data = linear_data();
        let config = GradientBoostingConfig::default()
            .set_nr_iterations(4)
            .set_tree(TreeEnsembleConfig::regression().set_max_depth(Some(2)).set_seed(Some(1)));
        let monitor = RecordingMonitor::default();
        GradientBoostingLearner::new(&config, &data)
            .unwrap()
            .learn(&monitor)
            .unwrap();
        assert_eq!(monitor.sub_tasks.load(Ordering::SeqCst), 4);
        // every iteration's tree reports through its own window, then the iteration itself
        let fractions = monitor.fractions.lock().unwrap().clone();
        assert_eq!(fractions, vec![0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn test_training_error_does_not_increase() {
        let data = linear_data();
        let config = GradientBoostingConfig::default()
            .set_nr_iterations(5)
            .set_learning_rate(0.5)
            .set_tree(TreeEnsembleConfig::regression().set_max_depth(Some(2)).set_seed(Some(1)));
        let model = GradientBoostingLearner::new(&config, &data)
            .unwrap()
            .learn(&NoopMonitor)
            .unwrap();
        assert_eq!(model.nr_trees(), 5);
        for pair in model.training_loss.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12, "{:?}", model.training_loss);
        }
        let mut previous = f64::INFINITY;
        for k in 0..=5 {
            let partial = GradientBoostingModel {
                trees: model.trees[..k].to_vec(),
                ..model.clone()
            };
            let error = sse(&partial, &data);
            assert!(error <= previous + 1e-9);
            previous = error;
        }
        assert!(model.training_loss[4] < model.training_loss[0]);
    }

    #[test]
    fn test_absolute_and_huber_losses() {
        let data = linear_data();
        for loss in [BoostingLoss::AbsoluteError, BoostingLoss::Huber] {
            let config = GradientBoostingConfig::default()
                .set_nr_iterations(20)
                .set_loss(loss)
                .set_tree(TreeEnsembleConfig::regression().set_max_depth(Some(3)).set_seed(Some(2)));
            let model = GradientBoostingLearner::new(&config, &data)
                .unwrap()
                .learn(&NoopMonitor)
                .unwrap();
            assert!(model.training_loss[19] < model.training_loss[0]);
        }
    }

    #[test]
    fn test_json_round_trip_keeps_predictions() {
        let data = linear_data();
        let config = GradientBoostingConfig::default().set_nr_iterations(3);
        let model = GradientBoostingLearner::new(&config, &data)
            .unwrap()
            .learn(&NoopMonitor)
            .unwrap();
        let loaded = GradientBoostingModel::from_json(&model.json_dump().unwrap()).unwrap();
        let record = data.record(7);
        assert_eq!(loaded.predict(&record), model.predict(&record));
    }

    #[test]
    fn test_cancel() {
        let data = linear_data();
        let config = GradientBoostingConfig::default().set_nr_iterations(3);
        let monitor = CancelableMonitor::new();
        monitor.cancel();
        let result = GradientBoostingLearner::new(&config, &data).unwrap().learn(&monitor);
        assert!(matches!(result, Err(TreeEnsembleError::Canceled)));
    }

    #[test]
    fn test_nominal_target_rejected() {
        let data = TreeDataBuilder::new()
            .add_numeric_column("x", vec![1.0, 2.0])
            .set_nominal_target("y", &["a", "b"])
            .build()
            .unwrap();
        let config = GradientBoostingConfig::default();
        assert!(matches!(
            GradientBoostingLearner::new(&config, &data),
            Err(TreeEnsembleError::InvalidConfiguration(_))
        ));
    }
}
