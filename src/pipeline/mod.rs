//! Preprocessing + resampling + classification pipeline.
//!
//! A [`Pipeline`] is an ordered list of named [`Stage`]s. Fitting walks every
//! stage; inference walks only the stages whose
//! [`Stage::active_at_inference`] flag is set, which keeps the oversampler
//! out of the scoring path.

pub mod encoded;
pub mod forest;
pub mod preprocess;
pub mod smote;
pub mod tree;

use crate::config::TrainingConfig;
use crate::error::{PredictionError, TrainingError};
use crate::features::{CategoricalFeature, FeatureRow, FeatureSchema, NumericFeature};
use serde::{Deserialize, Serialize};

pub use encoded::{EncodedMatrix, FeatureLayout, UNSEEN};
pub use forest::RandomForestClassifier;
pub use preprocess::{ColumnPreprocessor, OneHotEncoder, StandardScaler};
pub use smote::SmoteOversampler;
pub use tree::DecisionTree;

/// Data flowing between stages
#[derive(Debug, Clone)]
pub enum Batch {
    /// Derived feature rows, labels attached while fitting
    Rows {
        rows: Vec<FeatureRow>,
        labels: Option<Vec<bool>>,
    },
    /// Scaled numerics plus categorical indices
    Encoded {
        x: EncodedMatrix,
        labels: Option<Vec<bool>>,
    },
    /// Per-row fraud probabilities
    Scored { probabilities: Vec<f64> },
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Batch::Rows { rows, .. } => rows.len(),
            Batch::Encoded { x, .. } => x.nrows(),
            Batch::Scored { probabilities } => probabilities.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            Batch::Rows { .. } => "rows",
            Batch::Encoded { .. } => "encoded",
            Batch::Scored { .. } => "scored",
        }
    }
}

/// One pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Preprocessing(ColumnPreprocessor),
    Oversampling(SmoteOversampler),
    Classifier(RandomForestClassifier),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Preprocessing(_) => "preprocessing",
            Stage::Oversampling(_) => "smote",
            Stage::Classifier(_) => "classifier",
        }
    }

    /// Whether the stage runs when scoring.
    ///
    /// Oversampling inference data would invent rows and corrupt the
    /// one-prediction-per-transaction contract, so it is fit-only.
    pub fn active_at_inference(&self) -> bool {
        !matches!(self, Stage::Oversampling(_))
    }

    /// Learn this stage's parameters and pass the transformed batch on.
    ///
    /// The classifier is the last stage and hands its input back unchanged.
    pub fn fit(&mut self, batch: Batch) -> Result<Batch, TrainingError> {
        match (self, batch) {
            (Stage::Preprocessing(pre), Batch::Rows { rows, labels }) => {
                pre.fit(&rows)?;
                let x = pre.transform(&rows)?;
                Ok(Batch::Encoded { x, labels })
            }
            (Stage::Oversampling(smote), Batch::Encoded { x, labels: Some(y) }) => {
                let (x, y) = smote.fit_resample(x, y);
                Ok(Batch::Encoded { x, labels: Some(y) })
            }
            (Stage::Classifier(forest), Batch::Encoded { x, labels: Some(y) }) => {
                forest.fit(&x, &y)?;
                Ok(Batch::Encoded { x, labels: Some(y) })
            }
            (stage, batch) => Err(TrainingError::Fit(format!(
                "stage `{}` cannot fit on a {} batch{}",
                stage.name(),
                batch.kind(),
                if matches!(batch, Batch::Encoded { labels: None, .. }) {
                    " without labels"
                } else {
                    ""
                }
            ))),
        }
    }

    /// Apply fitted parameters to a batch
    pub fn transform(&self, batch: Batch) -> Result<Batch, PredictionError> {
        match (self, batch) {
            (Stage::Preprocessing(pre), Batch::Rows { rows, labels }) => {
                pre.schema().check_compatible(&rows)?;
                let x = pre.transform(&rows)?;
                Ok(Batch::Encoded { x, labels })
            }
            (Stage::Oversampling(_), batch) => Ok(batch),
            (Stage::Classifier(forest), Batch::Encoded { x, .. }) => {
                let probabilities = forest.predict_proba(&x).map_err(PredictionError::Scoring)?;
                Ok(Batch::Scored { probabilities })
            }
            (stage, batch) => Err(PredictionError::Scoring(format!(
                "stage `{}` cannot transform a {} batch",
                stage.name(),
                batch.kind()
            ))),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Stage::Preprocessing(pre) => pre.is_fitted(),
            Stage::Oversampling(_) => true,
            Stage::Classifier(forest) => forest.is_fitted(),
        }
    }
}

/// Name and inference flag of a stage, for logging and inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub name: &'static str,
    pub active_at_inference: bool,
}

/// Ordered stages for one feature schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    schema: FeatureSchema,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Assemble an unfitted pipeline.
    ///
    /// Feature lists are put into canonical column order so two builds for
    /// the same columns are identical regardless of argument order.
    pub fn build(
        numeric: &[NumericFeature],
        categorical: &[CategoricalFeature],
        config: &TrainingConfig,
    ) -> Self {
        let schema = FeatureSchema {
            numeric: NumericFeature::ALL
                .into_iter()
                .filter(|f| numeric.contains(f))
                .collect(),
            categorical: CategoricalFeature::ALL
                .into_iter()
                .filter(|f| categorical.contains(f))
                .collect(),
        };

        let forest = RandomForestClassifier::new(config.n_estimators, config.seed)
            .with_max_depth(config.max_depth)
            .with_min_samples(config.min_samples_split, config.min_samples_leaf);

        Self {
            stages: vec![
                Stage::Preprocessing(ColumnPreprocessor::new(schema.clone())),
                Stage::Oversampling(SmoteOversampler::new(config.smote_k_neighbors, config.seed)),
                Stage::Classifier(forest),
            ],
            schema,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn stages(&self) -> Vec<StageInfo> {
        self.stages
            .iter()
            .map(|s| StageInfo {
                name: s.name(),
                active_at_inference: s.active_at_inference(),
            })
            .collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.stages.iter().all(Stage::is_fitted)
    }

    /// Synthetic rows the oversampler added during the last fit
    pub fn synthesized_rows(&self) -> usize {
        self.stages
            .iter()
            .find_map(|s| match s {
                Stage::Oversampling(smote) => Some(smote.synthesized),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Fit every stage in order on labeled training rows
    pub fn fit(&mut self, rows: Vec<FeatureRow>, labels: Vec<bool>) -> Result<(), TrainingError> {
        if rows.len() != labels.len() {
            return Err(TrainingError::Fit(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let mut batch = Batch::Rows {
            rows,
            labels: Some(labels),
        };
        for stage in &mut self.stages {
            batch = stage.fit(batch)?;
        }
        Ok(())
    }

    /// Fraud probability per row, skipping fit-only stages.
    ///
    /// Always returns exactly one probability per input row.
    pub fn predict_proba(&self, rows: Vec<FeatureRow>) -> Result<Vec<f64>, PredictionError> {
        if !self.is_fitted() {
            return Err(PredictionError::Scoring("pipeline has not been fitted".to_string()));
        }

        let expected = rows.len();
        let mut batch = Batch::Rows { rows, labels: None };
        for stage in self.stages.iter().filter(|s| s.active_at_inference()) {
            batch = stage.transform(batch)?;
        }

        match batch {
            Batch::Scored { probabilities } if probabilities.len() == expected => Ok(probabilities),
            other => Err(PredictionError::Scoring(format!(
                "pipeline produced {} {} rows for {} inputs",
                other.len(),
                other.kind(),
                expected
            ))),
        }
    }

    /// Binary verdicts at `threshold`
    pub fn predict(&self, rows: Vec<FeatureRow>, threshold: f64) -> Result<Vec<bool>, PredictionError> {
        Ok(self
            .predict_proba(rows)?
            .into_iter()
            .map(|p| p > threshold)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureDeriver;
    use crate::types::transaction::TransactionRecord;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            n_estimators: 10,
            ..TrainingConfig::default()
        }
    }

    fn labeled_rows() -> (Vec<FeatureRow>, Vec<bool>) {
        let records: Vec<TransactionRecord> = (0..60)
            .map(|i| {
                let fraud = i % 10 == 0;
                let amt = if fraud { 15_000.0 + i as f64 } else { 20.0 + i as f64 };
                TransactionRecord::new(format!("tx_{i}"), "14-02-2023 11:00:00", amt).with_label(fraud)
            })
            .collect();
        let (rows, labels) = FeatureDeriver::new().derive(&records).unwrap().split_labels();
        (rows, labels.unwrap())
    }

    #[test]
    fn test_stage_order_and_flags() {
        let pipeline = Pipeline::build(&NumericFeature::ALL, &CategoricalFeature::ALL, &small_config());
        let stages = pipeline.stages();
        let names: Vec<&str> = stages.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["preprocessing", "smote", "classifier"]);
        assert_eq!(
            stages.iter().map(|s| s.active_at_inference).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert!(!pipeline.is_fitted());
    }

    #[test]
    fn test_build_canonicalizes_feature_order() {
        let a = Pipeline::build(
            &[NumericFeature::Month, NumericFeature::Amt],
            &[CategoricalFeature::Merchant, CategoricalFeature::Category],
            &small_config(),
        );
        let b = Pipeline::build(
            &[NumericFeature::Amt, NumericFeature::Month],
            &[CategoricalFeature::Category, CategoricalFeature::Merchant],
            &small_config(),
        );
        assert_eq!(a, b);
        assert_eq!(a.schema().names(), vec!["amt", "month", "category", "merchant"]);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let pipeline = Pipeline::build(&[NumericFeature::Amt], &[], &small_config());
        let (rows, _) = labeled_rows();
        assert!(matches!(
            pipeline.predict_proba(rows),
            Err(PredictionError::Scoring(_))
        ));
    }

    #[test]
    fn test_oversampling_does_not_change_inference_row_count() {
        let (rows, labels) = labeled_rows();
        let mut pipeline = Pipeline::build(&NumericFeature::ALL, &CategoricalFeature::ALL, &small_config());
        pipeline.fit(rows.clone(), labels.clone()).unwrap();

        // 6 frauds vs 54 legitimate rows: 48 synthesized while fitting
        assert_eq!(pipeline.synthesized_rows(), 48);
        assert!(pipeline.is_fitted());

        let predictions = pipeline.predict(rows, 0.5).unwrap();
        assert_eq!(predictions.len(), labels.len());
        assert_eq!(predictions, labels);
    }

    #[test]
    fn test_transform_rejects_missing_schema_columns() {
        let (rows, labels) = labeled_rows();
        let mut pipeline = Pipeline::build(&NumericFeature::ALL, &CategoricalFeature::ALL, &small_config());
        pipeline.fit(rows.clone(), labels).unwrap();

        let mut drifted = rows;
        drifted[3].gender = None;
        assert!(matches!(
            pipeline.predict_proba(drifted),
            Err(PredictionError::Features(crate::error::FeatureError::SchemaMismatch { .. }))
        ));
    }

    #[test]
    fn test_stage_rejects_wrong_batch_kind() {
        let mut stage = Stage::Classifier(RandomForestClassifier::new(2, 0));
        let (rows, labels) = labeled_rows();
        let err = stage
            .fit(Batch::Rows {
                rows,
                labels: Some(labels),
            })
            .unwrap_err();
        assert!(err.to_string().contains("classifier"));
    }

    #[test]
    fn test_fits_high_cardinality_merchant_column() {
        let records: Vec<TransactionRecord> = (0..1400)
            .map(|i| {
                let fraud = i % 20 == 0;
                let amt = if fraud { 9_000.0 + i as f64 } else { 15.0 + (i % 300) as f64 };
                let mut tx = TransactionRecord::new(format!("tx_{i}"), "03-03-2021 12:30:00", amt)
                    .with_label(fraud);
                tx.merchant = Some(format!("fraud_merchant_{:03}", i % 700));
                tx
            })
            .collect();
        let (rows, labels) = FeatureDeriver::new().derive(&records).unwrap().split_labels();
        let labels = labels.unwrap();

        let mut pipeline = Pipeline::build(
            &[NumericFeature::Amt],
            &[CategoricalFeature::Merchant],
            &small_config(),
        );
        pipeline.fit(rows.clone(), labels.clone()).unwrap();

        let preprocessor = match &pipeline.stages[0] {
            Stage::Preprocessing(pre) => pre,
            other => panic!("unexpected first stage {}", other.name()),
        };
        assert_eq!(preprocessor.output_width(), 701);
        let encoded = preprocessor.transform(&rows).unwrap();
        assert_eq!(encoded.categorical.dim(), (1400, 1));

        let predictions = pipeline.predict(rows, 0.5).unwrap();
        let agree = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        assert!(agree as f64 / labels.len() as f64 > 0.95, "{agree} of {} agree", labels.len());
    }
}
