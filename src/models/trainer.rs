//! Training orchestration: fetch, derive, split, fit, persist

use crate::config::TrainingConfig;
use crate::error::TrainingError;
use crate::features::FeatureDeriver;
use crate::metrics::EvaluationReport;
use crate::models::artifact::{ArtifactStore, TrainedArtifact};
use crate::models::split::{select, stratified_split};
use crate::pipeline::Pipeline;
use crate::store::TransactionStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a successful training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model_id: Uuid,
    /// Where the artifact was persisted
    pub location: String,
    pub total_rows: usize,
    pub fraud_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Minority rows synthesized while fitting
    pub synthesized_rows: usize,
    /// Feature columns the model was fitted on
    pub features: Vec<String>,
    pub evaluation: Option<EvaluationReport>,
    pub duration_ms: u128,
}

/// Trains a fresh model on the full current store.
///
/// Every run retrains from scratch and replaces the stored artifact; there
/// is no incremental training. Runs through one `Trainer` are serialized.
pub struct Trainer {
    store: Arc<dyn TransactionStore>,
    artifacts: Arc<dyn ArtifactStore>,
    config: TrainingConfig,
    deriver: FeatureDeriver,
    run_lock: Mutex<()>,
}

impl Trainer {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        artifacts: Arc<dyn ArtifactStore>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            config,
            deriver: FeatureDeriver::new(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run one training invocation end to end.
    ///
    /// Nothing is persisted unless every stage succeeds, so a failed run
    /// leaves the previous artifact in place.
    pub fn train(&self) -> Result<TrainingReport, TrainingError> {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let records = self.store.fetch_all()?;
        if records.is_empty() {
            warn!("No transactions in store, nothing to train on");
            return Err(TrainingError::NoData);
        }
        info!(count = records.len(), "Loaded transactions for training");

        let table = self.deriver.derive(&records)?;
        let unlabeled = table.labels.iter().filter(|l| l.is_none()).count();
        if unlabeled > 0 {
            return Err(TrainingError::MissingLabels { count: unlabeled });
        }

        let schema = table.schema();
        if schema.is_empty() {
            return Err(TrainingError::Fit("no usable feature columns".to_string()));
        }
        let (rows, labels) = table.split_labels();
        let labels = labels.ok_or(TrainingError::MissingLabels { count: unlabeled })?;
        let fraud_rows = labels.iter().filter(|&&l| l).count();

        info!(
            rows = rows.len(),
            fraud_rows,
            features = ?schema.names(),
            "Features derived"
        );

        let split = stratified_split(&labels, self.config.test_fraction, self.config.seed)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            "Split data (stratified)"
        );

        let mut pipeline = Pipeline::build(&schema.numeric, &schema.categorical, &self.config);
        pipeline.fit(select(&rows, &split.train), select(&labels, &split.train))?;
        info!(
            synthesized = pipeline.synthesized_rows(),
            trees = self.config.n_estimators,
            elapsed_ms = started.elapsed().as_millis(),
            "Pipeline fitted"
        );

        let evaluation = if split.test.is_empty() {
            None
        } else {
            let predicted = pipeline
                .predict(select(&rows, &split.test), self.config.decision_threshold)
                .map_err(|e| TrainingError::Fit(format!("held-out scoring failed: {e}")))?;
            let report = EvaluationReport::from_predictions(&predicted, &select(&labels, &split.test));
            report.print_summary();
            Some(report)
        };

        let artifact = TrainedArtifact {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            training_rows: split.train.len(),
            decision_threshold: self.config.decision_threshold,
            pipeline,
            evaluation: evaluation.clone(),
        };
        let location = self
            .artifacts
            .save(&artifact)
            .map_err(TrainingError::Persist)?;

        let report = TrainingReport {
            model_id: artifact.model_id,
            location,
            total_rows: rows.len(),
            fraud_rows,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            synthesized_rows: artifact.pipeline.synthesized_rows(),
            features: schema.names(),
            evaluation,
            duration_ms: started.elapsed().as_millis(),
        };

        info!(
            model_id = %report.model_id,
            location = %report.location,
            duration_ms = report.duration_ms,
            "Training complete"
        );
        Ok(report)
    }
}
