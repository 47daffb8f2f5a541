//! Batch scoring of the current transaction set

use crate::error::PredictionError;
use crate::features::FeatureDeriver;
use crate::models::artifact::ArtifactStore;
use crate::store::TransactionStore;
use crate::types::prediction::{PredictionOutput, ScoredTransaction};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Scores every stored transaction with the persisted model.
///
/// Read-only with respect to the artifact; safe to call concurrently.
pub struct Predictor {
    store: Arc<dyn TransactionStore>,
    artifacts: Arc<dyn ArtifactStore>,
    deriver: FeatureDeriver,
}

impl Predictor {
    pub fn new(store: Arc<dyn TransactionStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            artifacts,
            deriver: FeatureDeriver::new(),
        }
    }

    /// Score the full store.
    ///
    /// Fails with `ModelNotFound` before any training run. An empty store
    /// yields an empty output rather than an error.
    pub fn predict(&self) -> Result<PredictionOutput, PredictionError> {
        let started = Instant::now();
        let artifact = self.artifacts.load()?;

        let records = self.store.fetch_all()?;
        if records.is_empty() {
            info!("No transactions in store, nothing to score");
            return Ok(PredictionOutput::empty());
        }

        // stored labels are history, never model input
        let rows = self.deriver.derive(&records)?.into_rows();
        debug!(
            rows = rows.len(),
            model_id = %artifact.model_id,
            "Features derived for scoring"
        );

        let probabilities = artifact.pipeline.predict_proba(rows)?;
        if probabilities.len() != records.len() {
            return Err(PredictionError::Scoring(format!(
                "scored {} rows for {} transactions",
                probabilities.len(),
                records.len()
            )));
        }

        let threshold = artifact.decision_threshold;
        let scored: Vec<ScoredTransaction> = records
            .into_iter()
            .zip(probabilities)
            .map(|(transaction, fraud_probability)| ScoredTransaction {
                transaction,
                predicted_fraud: fraud_probability > threshold,
                fraud_probability,
            })
            .collect();

        let output = PredictionOutput::from_scored(artifact.model_id, scored);
        info!(
            model_id = %artifact.model_id,
            scored = output.all.len(),
            flagged = output.flagged_count(),
            elapsed_ms = started.elapsed().as_millis(),
            "Batch scoring complete"
        );
        Ok(output)
    }
}
