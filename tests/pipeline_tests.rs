//! End-to-end training and scoring through the public API

use fraud_model_pipeline::config::TrainingConfig;
use fraud_model_pipeline::models::ArtifactStore;
use fraud_model_pipeline::{
    FileArtifactStore, InMemoryArtifactStore, InMemoryTransactionStore, JsonFileTransactionStore,
    Predictor, Trainer, TransactionRecord, TransactionStore,
};
use std::sync::Arc;

fn training_config() -> TrainingConfig {
    TrainingConfig {
        n_estimators: 15,
        ..TrainingConfig::default()
    }
}

fn legitimate(id: &str, i: usize) -> TransactionRecord {
    let day = 1 + i % 28;
    let hour = 9 + i % 11;
    let amt = 10.0 + (i * 37 % 490) as f64;
    TransactionRecord::new(id, format!("{day:02}-06-2020 {hour:02}:15:00"), amt)
        .with_merchant_location(39.78 + 0.01 * (i % 7) as f64, -89.65)
        .with_label(false)
}

fn fraudulent(id: &str, i: usize) -> TransactionRecord {
    let day = 1 + (i * 3) % 28;
    let amt = 10_500.0 + (i * 211 % 9_000) as f64;
    TransactionRecord::new(id, format!("{day:02}-06-2020 02:40:00"), amt)
        .with_merchant_location(44.5 + 0.1 * (i % 5) as f64, -84.0)
        .with_label(true)
}

/// `n` rows where every `every`-th row is fraud (amount above 10000)
fn separable(prefix: &str, n: usize, every: usize) -> Vec<TransactionRecord> {
    (0..n)
        .map(|i| {
            let id = format!("{prefix}_{i}");
            if i % every == 0 {
                fraudulent(&id, i)
            } else {
                legitimate(&id, i)
            }
        })
        .collect()
}

#[test]
fn test_train_then_predict_follows_planted_rule() {
    let store = Arc::new(InMemoryTransactionStore::with_records(separable("train", 300, 10)));
    let artifacts = Arc::new(InMemoryArtifactStore::new());

    let trainer = Trainer::new(store.clone(), artifacts.clone(), training_config());
    let report = trainer.train().unwrap();
    assert_eq!(report.total_rows, 300);
    assert_eq!(report.fraud_rows, 30);
    assert_eq!(report.test_rows, 90);
    let evaluation = report.evaluation.unwrap();
    assert_eq!(evaluation.recall, 1.0);
    assert_eq!(evaluation.precision, 1.0);

    // rows the model has never seen, same rule
    let held_out = separable("held_out", 77, 7);
    store.replace_all(held_out.clone()).unwrap();

    let output = Predictor::new(store, artifacts).predict().unwrap();
    assert_eq!(output.all.len(), held_out.len());
    for (scored, original) in output.all.iter().zip(&held_out) {
        assert_eq!(scored.transaction.trans_num, original.trans_num);
        assert_eq!(scored.predicted_fraud, original.amt > 10_000.0);
    }
    assert_eq!(output.flagged_count(), 11);
    assert!(output.flagged.iter().all(|s| s.fraud_probability > 0.5));
}

#[test]
fn test_unlabeled_rows_are_scored() {
    let store = Arc::new(InMemoryTransactionStore::with_records(separable("train", 120, 6)));
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    Trainer::new(store.clone(), artifacts.clone(), training_config())
        .train()
        .unwrap();

    let unlabeled: Vec<TransactionRecord> = separable("new", 25, 5)
        .into_iter()
        .map(|mut tx| {
            tx.is_fraud = None;
            tx
        })
        .collect();
    store.replace_all(unlabeled).unwrap();

    let output = Predictor::new(store, artifacts).predict().unwrap();
    assert_eq!(output.all.len(), 25);
    assert_eq!(output.flagged_count(), 5);
}

#[test]
fn test_predict_before_training_reports_missing_model() {
    let store = Arc::new(InMemoryTransactionStore::with_records(separable("tx", 20, 4)));
    let predictor = Predictor::new(store, Arc::new(InMemoryArtifactStore::new()));

    let err = predictor.predict().unwrap_err();
    assert!(err.is_model_not_found());
}

#[test]
fn test_training_on_empty_store_writes_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = Arc::new(FileArtifactStore::new(dir.path().join("model.json")));
    let trainer = Trainer::new(
        Arc::new(InMemoryTransactionStore::new()),
        artifacts.clone(),
        training_config(),
    );

    assert!(trainer.train().unwrap_err().is_no_data());
    assert!(!artifacts.path().exists());
}

#[test]
fn test_file_backed_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileTransactionStore::new(dir.path().join("data/transactions.json")));
    let artifacts = Arc::new(FileArtifactStore::new(dir.path().join("models/fraud_model.json")));

    let mut records = separable("tx", 90, 9);
    records.push(records[3].clone());
    assert_eq!(store.replace_all(records).unwrap(), 90);

    let report = Trainer::new(store.clone(), artifacts.clone(), training_config())
        .train()
        .unwrap();
    assert_eq!(report.location, artifacts.location());
    assert!(artifacts.path().exists());

    // a fresh handle on the same slot sees the persisted model
    let reopened = Arc::new(FileArtifactStore::new(artifacts.path()));
    let output = Predictor::new(store, reopened).predict().unwrap();
    assert_eq!(output.model_id, Some(report.model_id));
    assert_eq!(output.all.len(), 90);
    assert_eq!(output.flagged_count(), 10);
}
