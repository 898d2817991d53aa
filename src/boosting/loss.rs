//! Losses of the regression boosting learners.
use crate::config::BoostingLoss;
use crate::utils::{median, quantile};

impl BoostingLoss {
    /// Constant prediction minimizing the loss on `y`.
    pub fn initial_value(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        match self {
            BoostingLoss::SquaredError => y.iter().sum::<f64>() / y.len() as f64,
            BoostingLoss::AbsoluteError | BoostingLoss::Huber => median(y),
        }
    }

    /// Transition point of the Huber loss, the `alpha` quantile of the absolute residuals.
    pub fn huber_delta(residuals: &[f64], alpha: f64) -> f64 {
        let absolute: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let delta = quantile(&absolute, alpha);
        if delta.is_nan() {
            0.0
        } else {
            delta
        }
    }

    #[inline]
    fn row_loss(&self, r: f64, delta: f64) -> f64 {
        match self {
            BoostingLoss::SquaredError => 0.5 * r * r,
            BoostingLoss::AbsoluteError => r.abs(),
            BoostingLoss::Huber => {
                let ar = r.abs();
                if ar <= delta {
                    0.5 * r * r
                } else {
                    delta * (ar - 0.5 * delta)
                }
            }
        }
    }

    /// Summed loss of `yhat` on `y`, `delta` is only used by the Huber loss.
    pub fn loss(&self, y: &[f64], yhat: &[f64], delta: f64) -> f64 {
        y.iter().zip(yhat).map(|(yi, yh)| self.row_loss(yi - yh, delta)).sum()
    }

    /// Negative gradient of the loss at `yhat`, the target of the next tree.
    pub fn pseudo_residuals(&self, y: &[f64], yhat: &[f64], delta: f64) -> Vec<f64> {
        y.iter()
            .zip(yhat)
            .map(|(yi, yh)| {
                let r = yi - yh;
                match self {
                    BoostingLoss::SquaredError => r,
                    BoostingLoss::AbsoluteError => {
                        if r == 0.0 {
                            0.0
                        } else {
                            r.signum()
                        }
                    }
                    BoostingLoss::Huber => r.clamp(-delta, delta),
                }
            })
            .collect()
    }

    /// Loss minimizing constant for the raw residuals of one leaf.
    pub fn leaf_value(&self, residuals: &[f64], delta: f64) -> f64 {
        if residuals.is_empty() {
            return 0.0;
        }
        match self {
            BoostingLoss::SquaredError => residuals.iter().sum::<f64>() / residuals.len() as f64,
            BoostingLoss::AbsoluteError => median(residuals),
            BoostingLoss::Huber => {
                // One step M-estimate starting at the median.
                let med = median(residuals);
                let correction = residuals
                    .iter()
                    .map(|r| {
                        let d = r - med;
                        d.signum() * d.abs().min(delta)
                    })
                    .sum::<f64>()
                    / residuals.len() as f64;
                med + correction
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initial_value() {
        let y = [1.0, 2.0, 3.0, 10.0];
        assert_relative_eq!(BoostingLoss::SquaredError.initial_value(&y), 4.0);
        assert_relative_eq!(BoostingLoss::AbsoluteError.initial_value(&y), 2.5);
        assert_relative_eq!(BoostingLoss::Huber.initial_value(&y), 2.5);
    }

    #[test]
    fn test_huber_residuals_are_clipped() {
        let y = [0.0, 1.0, 5.0];
        let yhat = [0.0; 3];
        let r = BoostingLoss::Huber.pseudo_residuals(&y, &yhat, 2.0);
        assert_eq!(r, vec![0.0, 1.0, 2.0]);
        assert_relative_eq!(BoostingLoss::Huber.loss(&y, &yhat, 2.0), 0.5 + 8.0);
        assert_eq!(
            BoostingLoss::AbsoluteError.pseudo_residuals(&y, &yhat, 0.0),
            vec![0.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_leaf_value() {
        let r = [1.0, 2.0, 3.0, 100.0];
        assert_relative_eq!(BoostingLoss::SquaredError.leaf_value(&r, 1.0), 26.5);
        assert_relative_eq!(BoostingLoss::AbsoluteError.leaf_value(&r, 1.0), 2.5);
        // median 2.5, clipped deviations -1, -0.5, 0.5, 1
        assert_relative_eq!(BoostingLoss::Huber.leaf_value(&r, 1.0), 2.5);
        assert_eq!(BoostingLoss::Huber.leaf_value(&[], 1.0), 0.0);
    }

    #[test]
    fn test_huber_delta() {
        let r = [-4.0, 1.0, 2.0, 3.0];
        assert_relative_eq!(BoostingLoss::huber_delta(&r, 1.0), 4.0);
        assert_eq!(BoostingLoss::huber_delta(&[], 0.9), 0.0);
    }
}
