//! Encoded feature matrix with categorical columns kept as vocabulary indices.
//!
//! The one-hot block is never materialized. A row stores one index per
//! categorical column, and consumers address one-hot features through a
//! [`FeatureLayout`] that numbers them as a dense encoder would.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Index stored for a category outside the fitted vocabulary (all-zero one-hot)
pub const UNSEEN: u32 = u32::MAX;

/// Column layout: numeric columns first, then one feature per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub numeric: usize,
    /// Vocabulary size of each categorical column
    pub cardinalities: Vec<usize>,
}

/// A single model feature, resolved from its flat index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureRef {
    Numeric(usize),
    /// One-hot indicator: categorical `column` holds `category`
    Category { column: usize, category: u32 },
}

impl FeatureLayout {
    /// Number of features, counting every category as one column
    pub fn width(&self) -> usize {
        self.numeric + self.cardinalities.iter().sum::<usize>()
    }

    pub fn resolve(&self, index: usize) -> Option<FeatureRef> {
        if index < self.numeric {
            return Some(FeatureRef::Numeric(index));
        }

        let mut offset = index - self.numeric;
        for (column, &size) in self.cardinalities.iter().enumerate() {
            if offset < size {
                return Some(FeatureRef::Category {
                    column,
                    category: offset as u32,
                });
            }
            offset -= size;
        }
        None
    }
}

/// Rows of scaled numerics plus categorical indices
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMatrix {
    pub numeric: Array2<f64>,
    pub categorical: Array2<u32>,
    pub layout: FeatureLayout,
}

impl EncodedMatrix {
    pub fn new(numeric: Array2<f64>, categorical: Array2<u32>, cardinalities: Vec<usize>) -> Self {
        let layout = FeatureLayout {
            numeric: numeric.ncols(),
            cardinalities,
        };
        Self {
            numeric,
            categorical,
            layout,
        }
    }

    /// Matrix without categorical columns
    pub fn from_numeric(numeric: Array2<f64>) -> Self {
        let categorical = Array2::<u32>::zeros((numeric.nrows(), 0));
        Self::new(numeric, categorical, Vec::new())
    }

    pub fn nrows(&self) -> usize {
        self.numeric.nrows()
    }

    pub fn row(&self, index: usize) -> EncodedRow<'_> {
        EncodedRow {
            numeric: self.numeric.row(index),
            categorical: self.categorical.row(index),
        }
    }

    /// Expand into the equivalent dense one-hot matrix
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((self.nrows(), self.layout.width()));
        for i in 0..self.nrows() {
            for feature in 0..self.layout.width() {
                if let Some(f) = self.layout.resolve(feature) {
                    dense[[i, feature]] = self.row(i).value(f);
                }
            }
        }
        dense
    }
}

/// Borrowed view of one encoded row
#[derive(Debug, Clone, Copy)]
pub struct EncodedRow<'a> {
    pub numeric: ArrayView1<'a, f64>,
    pub categorical: ArrayView1<'a, u32>,
}

impl EncodedRow<'_> {
    /// Value the feature would take in a dense one-hot matrix
    pub fn value(&self, feature: FeatureRef) -> f64 {
        match feature {
            FeatureRef::Numeric(j) => self.numeric[j],
            FeatureRef::Category { column, category } => {
                if self.categorical[column] == category {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}
