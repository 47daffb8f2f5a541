//! Synthetic Transaction Generator
//!
//! Writes a labeled transaction set with a planted fraud signal into the
//! transaction store, replacing whatever was there.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::Parser;
use fraud_model_pipeline::{
    AppConfig, JsonFileTransactionStore, TransactionRecord, TransactionStore,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "synth-transactions", about = "Generate labeled synthetic transactions")]
struct Args {
    /// Configuration file naming the transaction store
    #[arg(long, short, default_value = "config/config.toml")]
    config: PathBuf,

    /// Write here instead of the configured store path
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    count: usize,

    /// Probability that a generated row is fraudulent
    #[arg(long, default_value_t = 0.05)]
    fraud_rate: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

const CATEGORIES: &[&str] = &[
    "grocery_pos",
    "gas_transport",
    "home",
    "kids_pets",
    "shopping_net",
    "shopping_pos",
    "misc_net",
    "entertainment",
];

const CITIES: &[(&str, &str, f64, f64, i64)] = &[
    ("Springfield", "IL", 39.78, -89.65, 116_000),
    ("Moravian Falls", "NC", 36.08, -81.18, 3_495),
    ("Orient", "WA", 48.89, -118.21, 149),
    ("Malad City", "ID", 42.18, -112.26, 4_154),
    ("Boulder", "MT", 46.23, -112.11, 1_939),
];

/// Seeded generator of legitimate and fraudulent records
struct TransactionGenerator {
    rng: StdRng,
    counter: u64,
    epoch: NaiveDateTime,
}

impl TransactionGenerator {
    fn new(seed: u64) -> Self {
        let epoch = NaiveDate::from_ymd_opt(2020, 6, 21)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            rng: StdRng::seed_from_u64(seed),
            counter: 0,
            epoch,
        }
    }

    fn base(&mut self, amt: f64, hour: u32) -> TransactionRecord {
        self.counter += 1;
        let day = self.rng.gen_range(0..60);
        let minute = self.rng.gen_range(0..60);
        let second = self.rng.gen_range(0..60);
        let at = self.epoch
            + Duration::days(day)
            + Duration::hours(hour as i64)
            + Duration::minutes(minute)
            + Duration::seconds(second);

        let (city, state, lat, long, pop) = CITIES[self.rng.gen_range(0..CITIES.len())];
        let category = CATEGORIES[self.rng.gen_range(0..CATEGORIES.len())];
        let gender = if self.rng.gen_bool(0.5) { "F" } else { "M" };

        let mut tx = TransactionRecord::new(
            format!("{:032x}", self.rng.gen::<u128>()),
            at.format("%d-%m-%Y %H:%M:%S").to_string(),
            (amt * 100.0).round() / 100.0,
        );
        tx.cc_num = self
            .rng
            .gen_range(1_000_000_000_000_000u64..9_999_999_999_999_999)
            .to_string();
        tx.merchant = Some(format!("fraud_merchant_{}", self.rng.gen_range(1..500)));
        tx.category = Some(category.to_string());
        tx.gender = Some(gender.to_string());
        tx.city = city.to_string();
        tx.state = state.to_string();
        tx.lat = lat;
        tx.long = long;
        tx.city_pop = Some(pop);
        tx.unix_time = at.and_utc().timestamp();
        tx.street = format!("{} Synthetic Rd", self.counter);
        tx
    }

    /// Daytime purchase near home
    fn generate_legitimate(&mut self) -> TransactionRecord {
        let amt = self.rng.gen_range(2.0..250.0);
        let hour = self.rng.gen_range(7..22);
        let tx = self.base(amt, hour);
        let merch_lat = tx.lat + self.rng.gen_range(-0.5..0.5);
        let merch_long = tx.long + self.rng.gen_range(-0.5..0.5);
        tx.with_merchant_location(merch_lat, merch_long).with_label(false)
    }

    /// Large late-night purchase at a far merchant
    fn generate_fraudulent(&mut self) -> TransactionRecord {
        let amt = self.rng.gen_range(800.0..15_000.0);
        let hour = self.rng.gen_range(0..4);
        let mut tx = self.base(amt, hour);
        let merch_lat = tx.lat + self.rng.gen_range(3.0..8.0);
        let merch_long = tx.long - self.rng.gen_range(3.0..8.0);
        let category = if self.rng.gen_bool(0.5) { "shopping_net" } else { "misc_net" };
        tx.category = Some(category.to_string());
        tx.with_merchant_location(merch_lat, merch_long).with_label(true)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synth_transactions=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.fraud_rate) {
        anyhow::bail!("--fraud-rate must lie in [0, 1], got {}", args.fraud_rate);
    }

    let path = match args.output {
        Some(path) => path,
        None if args.config.exists() => {
            AppConfig::load_from_path(&args.config)?.store.transactions_path
        }
        None => AppConfig::default().store.transactions_path,
    };

    info!(
        path = %path.display(),
        count = args.count,
        fraud_rate = args.fraud_rate,
        seed = args.seed,
        "Generating synthetic transactions"
    );

    let mut generator = TransactionGenerator::new(args.seed);
    let mut label_rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let records: Vec<TransactionRecord> = (0..args.count)
        .map(|_| {
            if label_rng.gen_bool(args.fraud_rate) {
                generator.generate_fraudulent()
            } else {
                generator.generate_legitimate()
            }
        })
        .collect();
    let fraud = records.iter().filter(|tx| tx.is_fraud == Some(true)).count();

    let stored = JsonFileTransactionStore::new(&path)
        .replace_all(records)
        .with_context(|| format!("Failed to write transactions to {}", path.display()))?;

    info!(
        stored,
        legitimate = stored.saturating_sub(fraud),
        fraudulent = fraud,
        "Completed!"
    );
    Ok(())
}
