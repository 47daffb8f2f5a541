//! Card transaction records as delivered by the transaction store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A labeled card transaction.
///
/// Identity and address fields are carried through to prediction output but
/// never reach the feature vector. `trans_num` is unique across the store;
/// uniqueness is enforced at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Store row id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Transaction date-time as uploaded, day-first or ISO
    pub trans_date_trans_time: String,

    /// Card number
    pub cc_num: String,

    /// Merchant name
    #[serde(default)]
    pub merchant: Option<String>,

    /// Spending category, e.g. `grocery_pos`
    #[serde(default)]
    pub category: Option<String>,

    /// Transaction amount
    pub amt: f64,

    pub first: String,
    pub last: String,

    /// Cardholder gender (`M` / `F`)
    #[serde(default)]
    pub gender: Option<String>,

    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,

    /// Cardholder latitude
    pub lat: f64,
    /// Cardholder longitude
    pub long: f64,

    #[serde(default)]
    pub city_pop: Option<i64>,

    pub job: String,
    pub dob: String,

    /// Unique transaction number
    pub trans_num: String,
    pub unix_time: i64,

    pub merch_lat: f64,
    pub merch_long: f64,

    /// Ground-truth label; absent for unlabeled scoring input
    #[serde(default)]
    pub is_fraud: Option<bool>,

    /// Ingestion timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// Create a record with placeholder identity fields.
    ///
    /// Mostly useful for tests and synthetic data; everything the feature
    /// deriver reads is set from the arguments or left at a neutral value.
    pub fn new(trans_num: impl Into<String>, trans_date_trans_time: impl Into<String>, amt: f64) -> Self {
        Self {
            id: None,
            trans_date_trans_time: trans_date_trans_time.into(),
            cc_num: "0000000000000000".to_string(),
            merchant: Some("fraud_Kirlin and Sons".to_string()),
            category: Some("grocery_pos".to_string()),
            amt,
            first: "Jane".to_string(),
            last: "Doe".to_string(),
            gender: Some("F".to_string()),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip: "62701".to_string(),
            lat: 39.78,
            long: -89.65,
            city_pop: Some(116_000),
            job: "Engineer".to_string(),
            dob: "1980-01-01".to_string(),
            trans_num: trans_num.into(),
            unix_time: 0,
            merch_lat: 39.80,
            merch_long: -89.60,
            is_fraud: None,
            created_at: None,
        }
    }

    /// Attach a ground-truth label
    pub fn with_label(mut self, is_fraud: bool) -> Self {
        self.is_fraud = Some(is_fraud);
        self
    }

    /// Set the merchant location
    pub fn with_merchant_location(mut self, merch_lat: f64, merch_long: f64) -> Self {
        self.merch_lat = merch_lat;
        self.merch_long = merch_long;
        self
    }
}
