//! Prediction output data structures

use crate::types::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transaction annotated with the model's verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTransaction {
    #[serde(flatten)]
    pub transaction: TransactionRecord,

    /// Binary verdict at the configured decision threshold
    pub predicted_fraud: bool,

    /// Averaged fraud probability across the forest (0.0 - 1.0)
    pub fraud_probability: f64,
}

/// Result of a batch scoring run.
///
/// Both views preserve the store's row order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionOutput {
    /// Model that produced the scores; `None` when the store was empty
    pub model_id: Option<Uuid>,

    /// Rows predicted fraudulent
    pub flagged: Vec<ScoredTransaction>,

    /// Every scored row
    pub all: Vec<ScoredTransaction>,
}

impl PredictionOutput {
    /// Output for an empty transaction store
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build both views from scored rows
    pub fn from_scored(model_id: Uuid, all: Vec<ScoredTransaction>) -> Self {
        let flagged = all.iter().filter(|s| s.predicted_fraud).cloned().collect();
        Self {
            model_id: Some(model_id),
            flagged,
            all,
        }
    }

    /// Number of rows flagged as fraud
    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(trans_num: &str, predicted_fraud: bool) -> ScoredTransaction {
        ScoredTransaction {
            transaction: TransactionRecord::new(trans_num, "01-01-2023 10:15:00", 10.0),
            predicted_fraud,
            fraud_probability: if predicted_fraud { 0.9 } else { 0.1 },
        }
    }

    #[test]
    fn test_flagged_view_preserves_order() {
        let output = PredictionOutput::from_scored(
            Uuid::new_v4(),
            vec![
                scored("a", true),
                scored("b", false),
                scored("c", true),
            ],
        );

        assert_eq!(output.all.len(), 3);
        let flagged: Vec<&str> = output
            .flagged
            .iter()
            .map(|s| s.transaction.trans_num.as_str())
            .collect();
        assert_eq!(flagged, vec!["a", "c"]);
    }

    #[test]
    fn test_scored_transaction_flattens_record() {
        let json = serde_json::to_value(scored("tx_1", true)).unwrap();
        assert_eq!(json["trans_num"], "tx_1");
        assert_eq!(json["predicted_fraud"], true);
    }
}
