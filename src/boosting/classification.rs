use super::{check_columns, BoostedTree, Coefficients, ResidualTrees};
use crate::config::{GradientBoostingConfig, ModelIO};
use crate::constants::EPSILON;
use crate::data::{NominalTarget, PredictorRecord, TargetColumn, TreeData, TreeMetaData};
use crate::ensemble::ClassPrediction;
use crate::errors::TreeEnsembleError;
use crate::progress::ProgressMonitor;
use hashbrown::HashMap;
use log::info;
use serde::{Deserialize, Serialize};

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.iter().map(|e| e / total).collect()
}

/// Multi-class boosted model, one tree per class and iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassificationModel {
    pub config: GradientBoostingConfig,
    pub meta: TreeMetaData,
    /// `trees[iteration][class]`
    pub trees: Vec<Vec<BoostedTree>>,
    /// Mean multinomial deviance after every iteration.
    pub training_loss: Vec<f64>,
}

impl ModelIO for GradientBoostingClassificationModel {}

impl GradientBoostingClassificationModel {
    fn scores(&self, record: &PredictorRecord) -> Vec<f64> {
        let mut scores = vec![0.0; self.meta.class_names.len()];
        for iteration in &self.trees {
            for (class, tree) in iteration.iter().enumerate() {
                scores[class] += self.config.learning_rate * tree.contribution(record);
            }
        }
        scores
    }

    pub fn predict(&self, record: &PredictorRecord) -> ClassPrediction {
        let probabilities = softmax(&self.scores(record));
        let mut class = 0;
        for (k, p) in probabilities.iter().enumerate() {
            if *p > probabilities[class] {
                class = k;
            }
        }
        ClassPrediction {
            class,
            class_name: self.meta.class_names.get(class).cloned().unwrap_or_default(),
            probabilities,
        }
    }
}

/// Gradient boosting of a nominal target with K regression trees per iteration, one on the residuals
/// of each class probability, and leaf values from a single Newton step.
pub struct GradientBoostingClassificationLearner<'a> {
    config: &'a GradientBoostingConfig,
    data: &'a TreeData,
    target: &'a NominalTarget,
}

impl<'a> GradientBoostingClassificationLearner<'a> {
    pub fn new(config: &'a GradientBoostingConfig, data: &'a TreeData) -> Result<Self, TreeEnsembleError> {
        config.validate()?;
        check_columns(data)?;
        let target = match data.target() {
            TargetColumn::Nominal(target) => target,
            TargetColumn::Numeric(target) => {
                return Err(TreeEnsembleError::InvalidConfiguration(format!(
                    "boosted classification needs a nominal target, \"{}\" is numeric",
                    target.name
                )))
            }
        };
        if target.nr_classes() < 2 {
            return Err(TreeEnsembleError::InvalidData(format!(
                "target \"{}\" has less than two classes",
                target.name
            )));
        }
        Ok(GradientBoostingClassificationLearner { config, data, target })
    }

    pub fn learn(
        &self,
        monitor: &dyn ProgressMonitor,
    ) -> Result<GradientBoostingClassificationModel, TreeEnsembleError> {
        let n = self.data.nr_rows();
        let k = self.target.nr_classes();
        let factor = (k - 1) as f64 / k as f64;
        let mut scores = vec![vec![0.0; k]; n];
        let mut trees = ResidualTrees::new(self.data, self.config);
        let mut model = GradientBoostingClassificationModel {
            config: self.config.clone(),
            meta: self.data.meta(),
            trees: Vec::with_capacity(self.config.nr_iterations),
            training_loss: Vec::with_capacity(self.config.nr_iterations),
        };

        for iteration in 0..self.config.nr_iterations {
            let probabilities: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();
            let mut class_trees = Vec::with_capacity(k);
            let iteration_monitor = monitor.create_sub_progress(1.0 / self.config.nr_iterations as f64);
            for class in 0..k {
                monitor.check_canceled()?;
                let residuals: Vec<f64> = (0..n)
                    .map(|row| {
                        let indicator = if self.target.value(row) == class { 1.0 } else { 0.0 };
                        indicator - probabilities[row][class]
                    })
                    .collect();
                let class_monitor = iteration_monitor.create_sub_progress(1.0 / k as f64);
                let (tree, leaves) = trees.fit(residuals.clone(), class_monitor.as_ref())?;
                let mut coefficients = HashMap::with_capacity(leaves.len());
                for leaf in &leaves {
                    let numerator: f64 = leaf.rows.iter().map(|r| residuals[*r]).sum();
                    let denominator: f64 = leaf
                        .rows
                        .iter()
                        .map(|r| residuals[*r].abs() * (1.0 - residuals[*r].abs()))
                        .sum();
                    let value = if denominator < EPSILON {
                        0.0
                    } else {
                        factor * numerator / denominator
                    };
                    coefficients.insert(leaf.signature.as_ref().clone(), value);
                }
                class_trees.push(BoostedTree {
                    tree,
                    coefficients: Coefficients::PerLeaf(coefficients),
                });
            }
            for (row, s) in scores.iter_mut().enumerate() {
                for (class, tree) in class_trees.iter().enumerate() {
                    s[class] += self.config.learning_rate * tree.contribution_row(self.data, row);
                }
            }
            let deviance = scores
                .iter()
                .enumerate()
                .map(|(row, s)| -softmax(s)[self.target.value(row)].max(f64::MIN_POSITIVE).ln())
                .sum::<f64>()
                / n as f64;
            info!("iteration {}, training deviance {:.6}", iteration, deviance);
            model.trees.push(class_trees);
            model.training_loss.push(deviance);
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
    use crate::config::TreeEnsembleConfig;
    use crate::data::TreeDataBuilder;
    use crate::progress::NoopMonitor;
    use approx::assert_relative_eq;

    fn three_classes() -> TreeData {
        let x: Vec<f64> = (0..150).map(f64::from).collect();
        let y: Vec<&str> = (0..150)
            .map(|i| match i / 50 {
                0 => "low",
                1 => "mid",
                _ => "high",
            })
            .collect();
        TreeDataBuilder::new()
            .add_numeric_column("x", x)
            .set_nominal_target("y", &y)
            .build()
            .unwrap()
    }

    #[test]
    fn test_separable_classes() {
        let data = three_classes();
        let config = GradientBoostingConfig::default()
            .set_nr_iterations(10)
            .set_learning_rate(0.5)
            .set_tree(TreeEnsembleConfig::regression().set_max_depth(Some(2)).set_seed(Some(3)));
        let model = GradientBoostingClassificationLearner::new(&config, &data)
            .unwrap()
            .learn(&NoopMonitor)
            .unwrap();
        assert_eq!(model.trees.len(), 10);
        assert!(model.trees.iter().all(|t| t.len() == 3));
        assert!(model.training_loss[9] < model.training_loss[0]);

        let correct = (0..150)
            .filter(|row| model.predict(&data.record(*row)).class == *row / 50)
            .count();
        assert!(correct >= 145, "{} of 150 correct", correct);
        let prediction = model.predict(&data.record(120));
        assert_eq!(prediction.class_name, "high");
        assert_relative_eq!(prediction.probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_softmax() {
        let p = softmax(&[0.0, 0.0]);
        assert_relative_eq!(p[0], 0.5);
        let p = softmax(&[1000.0, 0.0]);
        assert_relative_eq!(p[0], 1.0);
    }
}
