//! Column-wise preprocessing: standardized numerics, one-hot categoricals

use crate::error::FeatureError;
use crate::features::{CategoricalFeature, FeatureRow, FeatureSchema, NumericFeature};
use crate::pipeline::encoded::{EncodedMatrix, UNSEEN};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-column zero-mean, unit-variance scaling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Learn column means and population standard deviations.
    ///
    /// Constant columns get a scale of 1 so they transform to zero.
    pub fn fit(columns: &[Vec<f64>]) -> Self {
        let mut mean = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());

        for column in columns {
            let n = column.len().max(1) as f64;
            let m = column.iter().sum::<f64>() / n;
            let variance = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            mean.push(m);
            scale.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        Self { mean, scale }
    }

    pub fn apply(&self, column: usize, value: f64) -> f64 {
        (value - self.mean[column]) / self.scale[column]
    }
}

/// One-hot encoding with a learned vocabulary per column.
///
/// Categories never seen during fit encode to all zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted categories per column
    pub vocabularies: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(columns: &[Vec<&str>]) -> Self {
        let vocabularies = columns
            .iter()
            .map(|column| {
                let mut vocab: Vec<String> = column.iter().map(|v| v.to_string()).collect();
                vocab.sort();
                vocab.dedup();
                vocab
            })
            .collect();
        Self { vocabularies }
    }

    /// Total encoded width
    pub fn width(&self) -> usize {
        self.vocabularies.iter().map(Vec::len).sum()
    }

    /// Offset of the category within the encoded block of `column`, if known
    pub fn position(&self, column: usize, value: &str) -> Option<usize> {
        self.vocabularies[column]
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .ok()
    }
}

/// Fitted column transformer for a fixed feature schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPreprocessor {
    schema: FeatureSchema,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    fitted: bool,
}

impl ColumnPreprocessor {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            scaler: StandardScaler::default(),
            encoder: OneHotEncoder::default(),
            fitted: false,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Number of features after encoding, one per category
    pub fn output_width(&self) -> usize {
        self.schema.numeric.len() + self.encoder.width()
    }

    /// Learn scaling parameters and vocabularies from training rows only
    pub fn fit(&mut self, rows: &[FeatureRow]) -> Result<(), FeatureError> {
        self.schema.check_compatible(rows)?;

        let numeric_columns = self
            .schema
            .numeric
            .iter()
            .map(|f| numeric_column(rows, *f))
            .collect::<Result<Vec<_>, _>>()?;
        let categorical_columns = self
            .schema
            .categorical
            .iter()
            .map(|f| categorical_column(rows, *f))
            .collect::<Result<Vec<_>, _>>()?;

        self.scaler = StandardScaler::fit(&numeric_columns);
        self.encoder = OneHotEncoder::fit(&categorical_columns);
        self.fitted = true;
        Ok(())
    }

    /// Encode rows with the fitted parameters.
    ///
    /// Numerics are scaled; categoricals become vocabulary indices, with
    /// [`UNSEEN`] for values the encoder never saw.
    pub fn transform(&self, rows: &[FeatureRow]) -> Result<EncodedMatrix, FeatureError> {
        let mut numeric = Array2::<f64>::zeros((rows.len(), self.schema.numeric.len()));
        let mut categorical = Array2::<u32>::zeros((rows.len(), self.schema.categorical.len()));

        for (i, row) in rows.iter().enumerate() {
            for (j, feature) in self.schema.numeric.iter().enumerate() {
                let value = row.numeric(*feature).ok_or(FeatureError::MissingColumn {
                    row: i,
                    column: feature.name(),
                })?;
                numeric[[i, j]] = self.scaler.apply(j, value);
            }

            for (j, feature) in self.schema.categorical.iter().enumerate() {
                let value = row.categorical(*feature).ok_or(FeatureError::MissingColumn {
                    row: i,
                    column: feature.name(),
                })?;
                categorical[[i, j]] = self
                    .encoder
                    .position(j, value)
                    .map_or(UNSEEN, |pos| pos as u32);
            }
        }

        let cardinalities = self.encoder.vocabularies.iter().map(Vec::len).collect();
        Ok(EncodedMatrix::new(numeric, categorical, cardinalities))
    }
}

fn numeric_column(rows: &[FeatureRow], feature: NumericFeature) -> Result<Vec<f64>, FeatureError> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| {
            r.numeric(feature).ok_or(FeatureError::MissingColumn {
                row: i,
                column: feature.name(),
            })
        })
        .collect()
}

fn categorical_column(
    rows: &[FeatureRow],
    feature: CategoricalFeature,
) -> Result<Vec<&str>, FeatureError> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| {
            r.categorical(feature).ok_or(FeatureError::MissingColumn {
                row: i,
                column: feature.name(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureDeriver;
    use crate::types::transaction::TransactionRecord;

    fn rows(amounts: &[f64], categories: &[&str]) -> Vec<FeatureRow> {
        let records: Vec<TransactionRecord> = amounts
            .iter()
            .zip(categories)
            .enumerate()
            .map(|(i, (amt, cat))| {
                let mut tx = TransactionRecord::new(format!("tx_{i}"), "01-01-2023 10:15:00", *amt);
                tx.category = Some(cat.to_string());
                tx
            })
            .collect();
        FeatureDeriver::new().derive(&records).unwrap().into_rows()
    }

    fn amt_and_category() -> FeatureSchema {
        FeatureSchema {
            numeric: vec![NumericFeature::Amt],
            categorical: vec![CategoricalFeature::Category],
        }
    }

    #[test]
    fn test_scaler_standardizes() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0, 3.0], vec![5.0, 5.0, 5.0]]);
        assert!((scaler.mean[0] - 2.0).abs() < 1e-12);
        assert!((scaler.scale[0] - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        // constant column
        assert_eq!(scaler.scale[1], 1.0);
        assert_eq!(scaler.apply(1, 5.0), 0.0);
    }

    #[test]
    fn test_encoder_vocabulary_is_sorted() {
        let encoder = OneHotEncoder::fit(&[vec!["travel", "grocery_pos", "travel"]]);
        assert_eq!(encoder.vocabularies[0], vec!["grocery_pos", "travel"]);
        assert_eq!(encoder.position(0, "travel"), Some(1));
        assert_eq!(encoder.position(0, "gas_transport"), None);
    }

    #[test]
    fn test_transform_layout() {
        let train = rows(&[10.0, 20.0, 30.0], &["travel", "grocery_pos", "travel"]);
        let mut pre = ColumnPreprocessor::new(amt_and_category());
        pre.fit(&train).unwrap();

        let x = pre.transform(&train).unwrap();
        assert_eq!(x.numeric.dim(), (3, 1));
        assert_eq!(x.categorical.dim(), (3, 1));
        assert_eq!(x.layout.width(), 3);
        assert_eq!(pre.output_width(), 3);
        // scaled amount has zero mean
        let mean: f64 = x.numeric.column(0).sum() / 3.0;
        assert!(mean.abs() < 1e-12);
        // vocabulary [grocery_pos, travel]
        assert_eq!(x.categorical.column(0).to_vec(), vec![1, 0, 1]);
        let dense = x.to_dense();
        assert_eq!(dense.row(0).to_vec()[1..], [0.0, 1.0]);
        assert_eq!(dense.row(1).to_vec()[1..], [1.0, 0.0]);
    }

    #[test]
    fn test_unseen_category_encodes_to_zeros() {
        let train = rows(&[10.0, 20.0], &["travel", "grocery_pos"]);
        let mut pre = ColumnPreprocessor::new(amt_and_category());
        pre.fit(&train).unwrap();

        let unseen = rows(&[15.0], &["misc_net"]);
        let x = pre.transform(&unseen).unwrap();
        assert_eq!(x.categorical[[0, 0]], UNSEEN);
        assert_eq!(x.to_dense().row(0).to_vec()[1..], [0.0, 0.0]);
    }

    #[test]
    fn test_fit_rejects_rows_missing_schema_columns() {
        let mut train = rows(&[10.0], &["travel"]);
        train[0].category = None;
        let mut pre = ColumnPreprocessor::new(amt_and_category());
        assert!(matches!(
            pre.fit(&train),
            Err(FeatureError::SchemaMismatch { .. })
        ));
        assert!(!pre.is_fitted());
    }

    #[test]
    fn test_high_cardinality_column_stays_compact() {
        let merchants: Vec<String> = (0..700).map(|m| format!("fraud_merchant_{m:03}")).collect();
        let records: Vec<TransactionRecord> = (0..2_100)
            .map(|i| {
                let mut tx = TransactionRecord::new(format!("tx_{i}"), "01-01-2023 10:15:00", i as f64);
                tx.merchant = Some(merchants[i % 700].clone());
                tx
            })
            .collect();
        let train = FeatureDeriver::new().derive(&records).unwrap().into_rows();
        let schema = FeatureSchema {
            numeric: vec![NumericFeature::Amt],
            categorical: vec![CategoricalFeature::Merchant],
        };

        let mut pre = ColumnPreprocessor::new(schema);
        pre.fit(&train).unwrap();
        let x = pre.transform(&train).unwrap();

        assert_eq!(x.layout.width(), 701);
        // one index per row, not 700 one-hot columns
        assert_eq!(x.categorical.dim(), (2_100, 1));
        assert_eq!(x.numeric.dim(), (2_100, 1));
        assert_eq!(x.categorical[[702, 0]], 2);
    }
}
