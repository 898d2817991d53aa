use crate::errors::TreeEnsembleError;
use std::cmp::Ordering;

pub fn fmt_vec_output(v: &[f64]) -> String {
    v.iter().map(|n| format!("{:.4}", n)).collect::<Vec<_>>().join(", ")
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), TreeEnsembleError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), TreeEnsembleError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(TreeEnsembleError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate a value that has to lie in the half open interval `(min, max]`.
pub fn validate_open_closed_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), TreeEnsembleError> {
    if value.is_nan() || value <= min || max < value {
        Err(TreeEnsembleError::InvalidParameter(
            parameter.to_string(),
            format!("real value within ({}, {}]", min, max),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Total order on floats, NaN last.
#[inline]
pub fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Quantile with linear interpolation between the two closest order statistics.
///
/// * `values` - Values to compute the quantile of, order does not matter.
/// * `q` - Quantile between 0 and 1.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(cmp_f64);
    quantile_sorted(&sorted, q)
}

/// Same as [`quantile`] for values that are already sorted ascending.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}
