//! Feature derivation shared by training and inference.
//!
//! Both the trainer and the predictor go through [`FeatureDeriver::derive`];
//! there is no second code path producing feature rows.
//! Identity, address and bookkeeping fields of a [`TransactionRecord`]
//! (names, street/city/state/zip, job, dob, trans_num, unix_time, cc_num,
//! id, created_at and the raw timestamp) never make it into a [`FeatureRow`].

use crate::error::FeatureError;
use crate::types::transaction::TransactionRecord;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Accepted timestamp layouts, day-first before ISO.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts, read as midnight
const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Numeric model inputs, in canonical column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFeature {
    Amt,
    Lat,
    Long,
    CityPop,
    MerchLat,
    MerchLong,
    Distance,
    Hour,
    DayOfWeek,
    Month,
}

impl NumericFeature {
    pub const ALL: [NumericFeature; 10] = [
        NumericFeature::Amt,
        NumericFeature::Lat,
        NumericFeature::Long,
        NumericFeature::CityPop,
        NumericFeature::MerchLat,
        NumericFeature::MerchLong,
        NumericFeature::Distance,
        NumericFeature::Hour,
        NumericFeature::DayOfWeek,
        NumericFeature::Month,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NumericFeature::Amt => "amt",
            NumericFeature::Lat => "lat",
            NumericFeature::Long => "long",
            NumericFeature::CityPop => "city_pop",
            NumericFeature::MerchLat => "merch_lat",
            NumericFeature::MerchLong => "merch_long",
            NumericFeature::Distance => "distance",
            NumericFeature::Hour => "hour",
            NumericFeature::DayOfWeek => "day_of_week",
            NumericFeature::Month => "month",
        }
    }
}

/// Categorical model inputs, in canonical column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFeature {
    Category,
    Gender,
    Merchant,
}

impl CategoricalFeature {
    pub const ALL: [CategoricalFeature; 3] = [
        CategoricalFeature::Category,
        CategoricalFeature::Gender,
        CategoricalFeature::Merchant,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CategoricalFeature::Category => "category",
            CategoricalFeature::Gender => "gender",
            CategoricalFeature::Merchant => "merchant",
        }
    }
}

/// The feature columns a pipeline is built for.
///
/// Persisted inside the artifact so inference can verify that the current
/// data still provides every column the model was fitted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric: Vec<NumericFeature>,
    pub categorical: Vec<CategoricalFeature>,
}

impl FeatureSchema {
    /// Candidate features that every row actually provides.
    ///
    /// Optional source columns (`city_pop`, `category`, `gender`, `merchant`)
    /// drop out of the schema when any row lacks them.
    pub fn live(rows: &[FeatureRow]) -> Self {
        let numeric = NumericFeature::ALL
            .into_iter()
            .filter(|f| rows.iter().all(|r| r.numeric(*f).is_some()))
            .collect();
        let categorical = CategoricalFeature::ALL
            .into_iter()
            .filter(|f| rows.iter().all(|r| r.categorical(*f).is_some()))
            .collect();
        Self {
            numeric,
            categorical,
        }
    }

    /// Column names, numeric first
    pub fn names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|f| f.name().to_string())
            .chain(self.categorical.iter().map(|f| f.name().to_string()))
            .collect()
    }

    /// Fail unless `rows` provide every column of this schema.
    ///
    /// Extra columns in the data are fine; missing ones are not.
    pub fn check_compatible(&self, rows: &[FeatureRow]) -> Result<(), FeatureError> {
        let live = FeatureSchema::live(rows);
        let covers_numeric = self.numeric.iter().all(|f| live.numeric.contains(f));
        let covers_categorical = self.categorical.iter().all(|f| live.categorical.contains(f));

        if covers_numeric && covers_categorical {
            Ok(())
        } else {
            Err(FeatureError::SchemaMismatch {
                expected: self.names(),
                actual: live.names(),
            })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.categorical.is_empty()
    }
}

/// One model-ready row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub amt: f64,
    pub lat: f64,
    pub long: f64,
    pub city_pop: Option<f64>,
    pub merch_lat: f64,
    pub merch_long: f64,
    /// Flat-plane distance between cardholder and merchant, in degrees
    pub distance: f64,
    /// 0-23
    pub hour: u32,
    /// 0 = Monday
    pub day_of_week: u32,
    /// 1-12
    pub month: u32,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub merchant: Option<String>,
}

impl FeatureRow {
    pub fn numeric(&self, feature: NumericFeature) -> Option<f64> {
        match feature {
            NumericFeature::Amt => Some(self.amt),
            NumericFeature::Lat => Some(self.lat),
            NumericFeature::Long => Some(self.long),
            NumericFeature::CityPop => self.city_pop,
            NumericFeature::MerchLat => Some(self.merch_lat),
            NumericFeature::MerchLong => Some(self.merch_long),
            NumericFeature::Distance => Some(self.distance),
            NumericFeature::Hour => Some(self.hour as f64),
            NumericFeature::DayOfWeek => Some(self.day_of_week as f64),
            NumericFeature::Month => Some(self.month as f64),
        }
    }

    pub fn categorical(&self, feature: CategoricalFeature) -> Option<&str> {
        match feature {
            CategoricalFeature::Category => self.category.as_deref(),
            CategoricalFeature::Gender => self.gender.as_deref(),
            CategoricalFeature::Merchant => self.merchant.as_deref(),
        }
    }
}

/// Derived rows plus the label column, still attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    pub labels: Vec<Option<bool>>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Schema of the columns present in every row
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::live(&self.rows)
    }

    /// Separate the label column from the features.
    ///
    /// Labels come back only if every row carries one.
    pub fn split_labels(self) -> (Vec<FeatureRow>, Option<Vec<bool>>) {
        let labels = self.labels.into_iter().collect::<Option<Vec<bool>>>();
        (self.rows, labels)
    }

    /// Drop the label column entirely
    pub fn into_rows(self) -> Vec<FeatureRow> {
        self.rows
    }
}

/// Parse a transaction timestamp in any accepted layout.
///
/// RFC 3339 values keep their written wall-clock time; the offset is
/// dropped rather than converted.
pub fn parse_transaction_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(value, fmt)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
        })
}

/// Transforms raw transaction records into feature rows.
///
/// Pure: no I/O, row count and order are preserved, and any record with an
/// unparseable timestamp fails the whole batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDeriver;

impl FeatureDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Derive a feature table from raw records
    pub fn derive(&self, transactions: &[TransactionRecord]) -> Result<FeatureTable, FeatureError> {
        let mut rows = Vec::with_capacity(transactions.len());
        let mut labels = Vec::with_capacity(transactions.len());

        for (index, tx) in transactions.iter().enumerate() {
            rows.push(self.derive_row(index, tx)?);
            labels.push(tx.is_fraud);
        }

        Ok(FeatureTable { rows, labels })
    }

    fn derive_row(&self, index: usize, tx: &TransactionRecord) -> Result<FeatureRow, FeatureError> {
        let timestamp = parse_transaction_time(&tx.trans_date_trans_time).ok_or_else(|| {
            FeatureError::InvalidTimestamp {
                row: index,
                value: tx.trans_date_trans_time.clone(),
            }
        })?;

        let distance = ((tx.merch_lat - tx.lat).powi(2) + (tx.merch_long - tx.long).powi(2)).sqrt();

        Ok(FeatureRow {
            amt: tx.amt,
            lat: tx.lat,
            long: tx.long,
            city_pop: tx.city_pop.map(|p| p as f64),
            merch_lat: tx.merch_lat,
            merch_long: tx.merch_long,
            distance,
            hour: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            month: timestamp.month(),
            category: tx.category.clone(),
            gender: tx.gender.clone(),
            merchant: tx.merchant.clone(),
        })
    }
}
