//! Held-out evaluation of a trained model.
//!
//! Computed after fitting from the test partition only; nothing here feeds
//! back into fitted parameters.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Binary confusion counts, fraud as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
}

impl ConfusionMatrix {
    pub fn from_predictions(predicted: &[bool], actual: &[bool]) -> Self {
        let mut matrix = Self::default();
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p, a) {
                (true, true) => matrix.true_positives += 1,
                (true, false) => matrix.false_positives += 1,
                (false, false) => matrix.true_negatives += 1,
                (false, true) => matrix.false_negatives += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// Scores on the held-out partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rows: u64,
    pub fraud_rows: u64,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    /// Flagged rows that were fraud (0 when nothing was flagged)
    pub precision: f64,
    /// Fraud rows that were flagged (0 when there was no fraud)
    pub recall: f64,
    pub f1: f64,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl EvaluationReport {
    pub fn from_predictions(predicted: &[bool], actual: &[bool]) -> Self {
        let confusion = ConfusionMatrix::from_predictions(predicted, actual);
        let c = &confusion;

        let precision = ratio(c.true_positives, c.true_positives + c.false_positives);
        let recall = ratio(c.true_positives, c.true_positives + c.false_negatives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            rows: c.total(),
            fraud_rows: c.true_positives + c.false_negatives,
            accuracy: ratio(c.true_positives + c.true_negatives, c.total()),
            precision,
            recall,
            f1,
            confusion,
        }
    }

    /// Log the report as a summary table
    pub fn print_summary(&self) {
        let c = &self.confusion;
        info!("╔══════════════════════════════════════════════════════╗");
        info!("║           FRAUD MODEL - HELD-OUT EVALUATION          ║");
        info!("╠══════════════════════════════════════════════════════╣");
        info!(
            "║ Rows: {:>8}   Fraud rows: {:>8}                  ║",
            self.rows, self.fraud_rows
        );
        info!(
            "║ Accuracy: {:>6.2}%   Precision: {:>6.2}%              ║",
            self.accuracy * 100.0,
            self.precision * 100.0
        );
        info!(
            "║ Recall:   {:>6.2}%   F1:        {:>6.3}               ║",
            self.recall * 100.0,
            self.f1
        );
        info!("╠══════════════════════════════════════════════════════╣");
        info!(
            "║ TP={:<8} FP={:<8} TN={:<8} FN={:<8}    ║",
            c.true_positives, c.false_positives, c.true_negatives, c.false_negatives
        );
        info!("╚══════════════════════════════════════════════════════╝");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_counts() {
        let predicted = [true, true, false, false, true];
        let actual = [true, false, false, true, true];

        let c = ConfusionMatrix::from_predictions(&predicted, &actual);
        assert_eq!(c.true_positives, 2);
        assert_eq!(c.false_positives, 1);
        assert_eq!(c.true_negatives, 1);
        assert_eq!(c.false_negatives, 1);
        assert_eq!(c.total(), 5);
    }

    #[test]
    fn test_report_scores() {
        let predicted = [true, true, false, false, true];
        let actual = [true, false, false, true, true];

        let report = EvaluationReport::from_predictions(&predicted, &actual);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.f1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.fraud_rows, 3);
    }

    #[test]
    fn test_no_positive_predictions() {
        let report = EvaluationReport::from_predictions(&[false, false], &[false, true]);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
        assert!((report.accuracy - 0.5).abs() < 1e-12);
    }
}
