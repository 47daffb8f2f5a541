//! Type definitions for the fraud model pipeline

pub mod prediction;
pub mod transaction;

pub use prediction::{PredictionOutput, ScoredTransaction};
pub use transaction::TransactionRecord;
