//! Configuration management for the fraud model pipeline

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub artifact: ArtifactConfig,
    pub training: TrainingConfig,
    pub nats: NatsConfig,
    pub logging: LoggingConfig,
}

/// Transaction store location
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON array or JSON-lines file holding the current transaction set
    pub transactions_path: PathBuf,
}

/// Trained artifact slot
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Well-known location of the single persisted model
    pub path: PathBuf,
}

/// Training hyperparameters.
///
/// Every randomized step draws from `seed`, so identical input and config
/// produce an identical artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of trees in the forest
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Neighbours considered when synthesizing minority samples
    #[serde(default = "default_smote_k_neighbors")]
    pub smote_k_neighbors: usize,
    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Fraud probability above which a row is flagged
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

fn default_test_fraction() -> f64 {
    0.3
}

fn default_seed() -> u64 {
    42
}

fn default_n_estimators() -> usize {
    100
}

fn default_smote_k_neighbors() -> usize {
    5
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_decision_threshold() -> f64 {
    0.5
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            n_estimators: default_n_estimators(),
            smote_k_neighbors: default_smote_k_neighbors(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            decision_threshold: default_decision_threshold(),
        }
    }
}

/// NATS connection configuration for the serve command
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject that triggers a training run
    pub train_subject: String,
    /// Subject that triggers batch scoring
    pub predict_subject: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                transactions_path: PathBuf::from("data/transactions.json"),
            },
            artifact: ArtifactConfig {
                path: PathBuf::from("models/fraud_model.json"),
            },
            training: TrainingConfig::default(),
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                train_subject: "fraud.model.train".to_string(),
                predict_subject: "fraud.model.predict".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.training.test_fraction, 0.3);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.n_estimators, 100);
        assert_eq!(config.training.max_depth, None);
    }

    #[test]
    fn test_load_partial_training_section() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[store]
transactions_path = "tx.json"

[artifact]
path = "model.json"

[training]
n_estimators = 10
max_depth = 6

[nats]
url = "nats://example:4222"
train_subject = "t"
predict_subject = "p"

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.training.n_estimators, 10);
        assert_eq!(config.training.max_depth, Some(6));
        // unspecified fields fall back to defaults
        assert_eq!(config.training.test_fraction, 0.3);
        assert_eq!(config.training.smote_k_neighbors, 5);
        assert_eq!(config.artifact.path, PathBuf::from("model.json"));
    }
}
