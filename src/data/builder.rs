use super::column::{BitColumn, NominalColumn, NumericColumn, TreeColumn};
use super::target::{NominalTarget, NumericTarget, TargetColumn};
use super::TreeData;
use crate::errors::TreeEnsembleError;

/// Collects columns and a target and turns them into an immutable [`TreeData`].
#[derive(Default)]
pub struct TreeDataBuilder {
    columns: Vec<TreeColumn>,
    target: Option<TargetColumn>,
    error: Option<TreeEnsembleError>,
}

impl TreeDataBuilder {
    pub fn new() -> Self {
        TreeDataBuilder::default()
    }

    /// Add a numeric column, NaN marks missing values.
    pub fn add_numeric_column(mut self, name: &str, values: Vec<f64>) -> Self {
        if values.iter().any(|v| v.is_infinite()) {
            self.fail(format!("column \"{}\" contains infinite values", name));
        }
        self.columns.push(TreeColumn::Numeric(NumericColumn::new(name, values)));
        self
    }

    pub fn add_nominal_column<S: AsRef<str>>(mut self, name: &str, values: &[Option<S>]) -> Self {
        self.columns.push(TreeColumn::Nominal(NominalColumn::new(name, values)));
        self
    }

    /// Add a bit-vector column. Every bit position becomes its own column named `{name}_{position}`.
    ///
    /// * `values` - Bit vector per row, all of the same width. None marks a missing vector.
    pub fn add_bit_vector_column(mut self, name: &str, values: &[Option<Vec<bool>>]) -> Self {
        let widths: Vec<usize> = values.iter().flatten().map(|v| v.len()).collect();
        let width = widths.first().copied().unwrap_or(0);
        if widths.iter().any(|w| *w != width) {
            self.fail(format!("bit vectors in column \"{}\" differ in length", name));
            return self;
        }
        for position in 0..width {
            let bits: Vec<Option<bool>> = values.iter().map(|v| v.as_ref().map(|v| v[position])).collect();
            self.columns
                .push(TreeColumn::Bit(BitColumn::new(&format!("{}_{}", name, position), &bits)));
        }
        self
    }

    pub fn set_nominal_target<S: AsRef<str>>(mut self, name: &str, values: &[S]) -> Self {
        self.target = Some(TargetColumn::Nominal(NominalTarget::new(name, values)));
        self
    }

    pub fn set_numeric_target(mut self, name: &str, values: Vec<f64>) -> Self {
        if values.iter().any(|v| !v.is_finite()) {
            self.fail(format!("target \"{}\" contains missing or infinite values", name));
        }
        self.target = Some(TargetColumn::Numeric(NumericTarget::new(name, values)));
        self
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(TreeEnsembleError::InvalidData(message));
        }
    }

    pub fn build(self) -> Result<TreeData, TreeEnsembleError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let target = self
            .target
            .ok_or_else(|| TreeEnsembleError::InvalidData("no target column set".to_string()))?;
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(TreeEnsembleError::InvalidData(format!("duplicate column \"{}\"", w[0])));
        }
        TreeData::new(self.columns, target)
    }
}
