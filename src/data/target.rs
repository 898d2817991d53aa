/// Nominal target of a classification problem. Targets have no missing values.
#[derive(Debug, Clone)]
pub struct NominalTarget {
    pub name: String,
    classes: Vec<String>,
    values: Vec<u32>,
}

impl NominalTarget {
    pub fn new<S: AsRef<str>>(name: &str, raw: &[S]) -> Self {
        let mut classes: Vec<String> = Vec::new();
        let values = raw
            .iter()
            .map(|v| {
                let v: &str = v.as_ref();
                match classes.iter().position(|c| c == v) {
                    Some(i) => i as u32,
                    None => {
                        classes.push(v.to_string());
                        (classes.len() - 1) as u32
                    }
                }
            })
            .collect();
        NominalTarget {
            name: name.to_string(),
            classes,
            values,
        }
    }

    /// Target built from class indices, used for the left/right target of the surrogate search.
    pub fn from_indices(name: &str, classes: Vec<String>, values: Vec<u32>) -> Self {
        NominalTarget {
            name: name.to_string(),
            classes,
            values,
        }
    }

    #[inline]
    pub fn value(&self, row: usize) -> usize {
        self.values[row] as usize
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn nr_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Numeric target of a regression problem.
#[derive(Debug, Clone)]
pub struct NumericTarget {
    pub name: String,
    values: Vec<f64>,
}

impl NumericTarget {
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        NumericTarget {
            name: name.to_string(),
            values,
        }
    }

    #[inline]
    pub fn value(&self, row: usize) -> f64 {
        self.values[row]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum TargetColumn {
    Nominal(NominalTarget),
    Numeric(NumericTarget),
}

impl TargetColumn {
    pub fn name(&self) -> &str {
        match self {
            TargetColumn::Nominal(t) => &t.name,
            TargetColumn::Numeric(t) => &t.name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TargetColumn::Nominal(t) => t.len(),
            TargetColumn::Numeric(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_target() {
        let t = NominalTarget::new("class", &["b", "a", "b"]);
        assert_eq!(t.classes(), &["b".to_string(), "a".to_string()]);
        assert_eq!(t.value(1), 1);
        assert_eq!(t.value(2), 0);
        assert_eq!(t.nr_classes(), 2);
    }
}
