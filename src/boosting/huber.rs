use super::{check_columns, numeric_target, BoostedTree, Coefficients, GradientBoostingModel, ResidualTrees};
use crate::config::{BoostingLoss, GradientBoostingConfig};
use crate::constants::EPSILON;
use crate::data::TreeData;
use crate::errors::TreeEnsembleError;
use crate::progress::ProgressMonitor;
use hashbrown::HashMap;
use log::{info, warn};

/// Gradient boosting with a coefficient per leaf, robust to outliers with the Huber or absolute loss.
///
/// Every iteration fits a tree to the pseudo residuals, which the Huber loss clips at the `alpha`
/// quantile of the absolute residuals. Each leaf then gets the loss minimizing constant of the raw
/// residuals of its rows.
pub struct HuberBoostingLearner<'a> {
    config: &'a GradientBoostingConfig,
    data: &'a TreeData,
}

impl<'a> HuberBoostingLearner<'a> {
    pub fn new(config: &'a GradientBoostingConfig, data: &'a TreeData) -> Result<Self, TreeEnsembleError> {
        config.validate()?;
        numeric_target(data)?;
        check_columns(data)?;
        Ok(HuberBoostingLearner { config, data })
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
            let raw: Vec<f64> = y.iter().zip(&prediction).map(|(yi, p)| yi - p).collect();
            let delta = match loss {
                BoostingLoss::Huber => BoostingLoss::huber_delta(&raw, self.config.alpha),
                _ => 0.0,
            };
            let iteration_monitor = monitor.create_sub_progress(1.0 / self.config.nr_iterations as f64);
            let (tree, leaves) = trees.fit(loss.pseudo_residuals(y, &prediction, delta), iteration_monitor.as_ref())?;

            let mut coefficients = HashMap::with_capacity(leaves.len());
            for leaf in &leaves {
                if leaf.rows.is_empty() {
                    warn!("leaf {} of iteration {} has no rows", leaf.signature, iteration);
                }
                let residuals: Vec<f64> = leaf.rows.iter().map(|r| raw[*r]).collect();
                coefficients.insert(leaf.signature.as_ref().clone(), loss.leaf_value(&residuals, delta));
            }
            let boosted = BoostedTree {
                tree,
                coefficients: Coefficients::PerLeaf(coefficients),
            };
            for (row, p) in prediction.iter_mut().enumerate() {
                *p += self.config.learning_rate * boosted.contribution_row(self.data, row);
            }

            let training_loss = loss.loss(y, &prediction, delta) / n as f64;
            info!("iteration {}, training loss {:.6}", iteration, training_loss);
            model.trees.push(boosted);
            model.training_loss.push(training_loss);
            monitor.set_progress(
                (iteration + 1) as f64 / self.config.nr_iterations as f64,
                &format!("iteration {} of {}", iteration + 1, self.config.nr_iterations),
            );
        }
        Ok(model)
    }
}
