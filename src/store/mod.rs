//! Transaction store: the single source of truth for training and scoring.
//!
//! The core only needs [`TransactionStore::fetch_all`], a consistent
//! snapshot of every stored record. Uploads replace the whole set.

use crate::error::StoreError;
use crate::types::transaction::TransactionRecord;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// One page of a filtered listing
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionRecord>,
    /// Matching records before pagination
    pub total: usize,
}

pub trait TransactionStore: Send + Sync {
    /// Snapshot of every stored record, in store order
    fn fetch_all(&self) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Replace the stored set, dropping repeated `trans_num`s (first wins).
    /// Returns the number of records stored.
    fn replace_all(&self, records: Vec<TransactionRecord>) -> Result<usize, StoreError>;

    /// Paginated listing, optionally filtered on the stored label
    fn list(
        &self,
        offset: usize,
        limit: usize,
        is_fraud: Option<bool>,
    ) -> Result<TransactionPage, StoreError> {
        let matching: Vec<TransactionRecord> = self
            .fetch_all()?
            .into_iter()
            .filter(|tx| is_fraud.map_or(true, |wanted| tx.is_fraud == Some(wanted)))
            .collect();
        let total = matching.len();
        let transactions = matching.into_iter().skip(offset).take(limit).collect();
        Ok(TransactionPage {
            transactions,
            total,
        })
    }
}

/// Deduplicate by `trans_num` and stamp store-assigned fields
fn prepare_batch(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    let now = Utc::now();
    let mut seen = HashSet::new();

    records
        .into_iter()
        .filter(|tx| seen.insert(tx.trans_num.clone()))
        .enumerate()
        .map(|(i, mut tx)| {
            tx.id = Some(i as i64 + 1);
            tx.created_at.get_or_insert(now);
            tx
        })
        .collect()
}

/// Process-local store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    records: RwLock<Vec<TransactionRecord>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<TransactionRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn fetch_all(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn replace_all(&self, records: Vec<TransactionRecord>) -> Result<usize, StoreError> {
        let batch = prepare_batch(records);
        let count = batch.len();
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = batch;
        Ok(count)
    }
}

/// Records kept in a JSON file: either one array or one object per line.
///
/// A missing file reads as an empty store.
#[derive(Debug, Clone)]
pub struct JsonFileTransactionStore {
    path: PathBuf,
}

impl JsonFileTransactionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionStore for JsonFileTransactionStore {
    fn fetch_all(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Transaction file not found, store is empty");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let records = parse_records(&content)?;
        debug!(path = %self.path.display(), count = records.len(), "Loaded transactions");
        Ok(records)
    }

    fn replace_all(&self, records: Vec<TransactionRecord>) -> Result<usize, StoreError> {
        let batch = prepare_batch(records);
        let payload = serde_json::to_vec(&batch).map_err(StoreError::Encode)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // unique per writer so concurrent uploads never share a temp file
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(&payload)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, &self.path)) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %cleanup, "Temporary transaction file not removed");
            }
            return Err(e.into());
        }

        info!(
            path = %self.path.display(),
            count = batch.len(),
            "Replaced stored transactions"
        );
        Ok(batch.len())
    }
}

/// Parse a JSON array or JSON-lines document
pub fn parse_records(content: &str) -> Result<Vec<TransactionRecord>, StoreError> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|source| StoreError::Decode {
            line: source.line(),
            source,
        });
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Decode { line: i + 1, source })
        })
        .collect()
}
