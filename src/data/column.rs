use fixedbitset::FixedBitSet;
use crate::utils::cmp_f64;
use serde::{Deserialize, Serialize};

/// Value of one row in one column, as seen by split conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordValue {
    Missing,
    Number(f64),
    /// Index into the nominal value table of the column.
    Category(u32),
    Bit(bool),
}

impl RecordValue {
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, RecordValue::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Nominal,
    Bit,
}

/// Numeric learning column. Rows are kept in value order so split search only needs to
/// sort the node's rows by their rank.
#[derive(Debug, Clone)]
pub struct NumericColumn {
    pub name: String,
    values: Vec<f64>,
    sorted_rows: Vec<usize>,
    rank: Vec<usize>,
    length_non_missing: usize,
}

impl NumericColumn {
    /// * `values` - One value per row, NaN marks a missing value.
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        let mut sorted_rows: Vec<usize> = (0..values.len()).collect();
        sorted_rows.sort_by(|a, b| cmp_f64(&values[*a], &values[*b]));
        let mut rank = vec![0; values.len()];
        for (position, row) in sorted_rows.iter().enumerate() {
            rank[*row] = position;
        }
        let length_non_missing = values.iter().filter(|v| !v.is_nan()).count();
        NumericColumn {
            name: name.to_string(),
            values,
            sorted_rows,
            rank,
            length_non_missing,
        }
    }

    #[inline]
    pub fn value(&self, row: usize) -> Option<f64> {
        let v = self.values[row];
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }

    /// Position of the row in ascending value order, missing values last.
    #[inline]
    pub fn rank(&self, row: usize) -> usize {
        self.rank[row]
    }

    /// Rows in ascending value order, missing values last.
    pub fn sorted_rows(&self) -> &[usize] {
        &self.sorted_rows
    }

    pub fn length_non_missing(&self) -> usize {
        self.length_non_missing
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Nominal learning column, values are indices into a value table in order of first appearance.
#[derive(Debug, Clone)]
pub struct NominalColumn {
    pub name: String,
    values: Vec<String>,
    rows: Vec<Option<u32>>,
}

impl NominalColumn {
    pub fn new<S: AsRef<str>>(name: &str, raw: &[Option<S>]) -> Self {
        let mut values: Vec<String> = Vec::new();
        let mut lookup: hashbrown::HashMap<String, u32> = hashbrown::HashMap::new();
        let rows = raw
            .iter()
            .map(|v| {
                v.as_ref().map(|s| {
                    let s: &str = s.as_ref();
                    match lookup.get(s) {
                        Some(i) => *i,
                        None => {
                            let i = values.len() as u32;
                            values.push(s.to_string());
                            lookup.insert(s.to_string(), i);
                            i
                        }
                    }
                })
            })
            .collect();
        NominalColumn {
            name: name.to_string(),
            values,
            rows,
        }
    }

    #[inline]
    pub fn value(&self, row: usize) -> Option<u32> {
        self.rows[row]
    }

    /// Value table, a row value `i` stands for `values()[i]`.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn nr_values(&self) -> usize {
        self.values.len()
    }

    pub fn value_index(&self, value: &str) -> Option<u32> {
        self.values.iter().position(|v| v == value).map(|i| i as u32)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One position of a bit-vector column.
#[derive(Debug, Clone)]
pub struct BitColumn {
    pub name: String,
    ones: FixedBitSet,
    missing: FixedBitSet,
}

impl BitColumn {
    pub fn new(name: &str, bits: &[Option<bool>]) -> Self {
        let mut ones = FixedBitSet::with_capacity(bits.len());
        let mut missing = FixedBitSet::with_capacity(bits.len());
        for (row, bit) in bits.iter().enumerate() {
            match bit {
                Some(true) => ones.insert(row),
                Some(false) => (),
                None => missing.insert(row),
            }
        }
        BitColumn {
            name: name.to_string(),
            ones,
            missing,
        }
    }

    #[inline]
    pub fn value(&self, row: usize) -> Option<bool> {
        if self.missing.contains(row) {
            None
        } else {
            Some(self.ones.contains(row))
        }
    }

    pub fn len(&self) -> usize {
        self.ones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ones.len() == 0
    }
}

/// Immutable learning column.
#[derive(Debug, Clone)]
pub enum TreeColumn {
    Numeric(NumericColumn),
    Nominal(NominalColumn),
    Bit(BitColumn),
}

impl TreeColumn {
    pub fn name(&self) -> &str {
        match self {
            TreeColumn::Numeric(c) => &c.name,
            TreeColumn::Nominal(c) => &c.name,
            TreeColumn::Bit(c) => &c.name,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            TreeColumn::Numeric(_) => ColumnKind::Numeric,
            TreeColumn::Nominal(_) => ColumnKind::Nominal,
            TreeColumn::Bit(_) => ColumnKind::Bit,
        }
    }

    #[inline]
    pub fn value(&self, row: usize) -> RecordValue {
        let value = match self {
            TreeColumn::Numeric(c) => c.value(row).map(RecordValue::Number),
            TreeColumn::Nominal(c) => c.value(row).map(RecordValue::Category),
            TreeColumn::Bit(c) => c.value(row).map(RecordValue::Bit),
        };
        value.unwrap_or(RecordValue::Missing)
    }

    #[inline]
    pub fn is_missing(&self, row: usize) -> bool {
        self.value(row).is_missing()
    }

    pub fn len(&self) -> usize {
        match self {
            TreeColumn::Numeric(c) => c.len(),
            TreeColumn::Nominal(c) => c.len(),
            TreeColumn::Bit(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
