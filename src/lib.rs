//! Fraud Model Pipeline Library
//!
//! Trains a random-forest fraud classifier on the stored transaction set
//! and scores that set in batch with the persisted model.

pub mod config;
pub mod consumer;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use consumer::CommandConsumer;
pub use error::{ArtifactError, FeatureError, PredictionError, StoreError, TrainingError};
pub use features::{FeatureDeriver, FeatureTable};
pub use models::{FileArtifactStore, InMemoryArtifactStore, Predictor, Trainer, TrainingReport};
pub use producer::ReplyProducer;
pub use store::{InMemoryTransactionStore, JsonFileTransactionStore, TransactionStore};
pub use types::{PredictionOutput, ScoredTransaction, TransactionRecord};
