//! Model training, persistence and batch inference

pub mod artifact;
pub mod inference;
pub mod split;
pub mod trainer;

pub use artifact::{ArtifactStore, FileArtifactStore, InMemoryArtifactStore, TrainedArtifact};
pub use inference::Predictor;
pub use split::{stratified_split, SplitIndices};
pub use trainer::{Trainer, TrainingReport};
