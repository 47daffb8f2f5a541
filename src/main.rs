//! Fraud Model Pipeline - Main Entry Point
//!
//! Trains the fraud classifier on the stored transaction set, scores that
//! set with the persisted model, or serves both operations over NATS.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fraud_model_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::{Command, CommandConsumer},
    producer::{CommandResponse, ReplyProducer},
    FileArtifactStore, JsonFileTransactionStore, Predictor, Trainer, TransactionStore,
};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fraud-model", version, about = "Fraud model training and batch scoring")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a fresh model on every stored transaction
    Train,
    /// Score every stored transaction with the current model
    Predict {
        /// Print only the rows predicted fraudulent
        #[arg(long)]
        flagged_only: bool,
    },
    /// List stored transactions
    List {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Filter on the stored label
        #[arg(long)]
        fraud: Option<bool>,
    },
    /// Answer train/predict requests over NATS
    Serve,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("fraud_model_pipeline={}", logging.level).parse()?)
        .add_directive(format!("fraud_model={}", logging.level).parse()?);

    // stdout carries command output, logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, from_file) = if cli.config.exists() {
        (AppConfig::load_from_path(&cli.config)?, true)
    } else {
        (AppConfig::default(), false)
    };
    init_logging(&config.logging)?;

    if from_file {
        info!(path = %cli.config.display(), "Configuration loaded");
    } else {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let store: Arc<dyn TransactionStore> =
        Arc::new(JsonFileTransactionStore::new(&config.store.transactions_path));
    let artifacts = Arc::new(FileArtifactStore::new(&config.artifact.path));
    let trainer = Arc::new(Trainer::new(
        store.clone(),
        artifacts.clone(),
        config.training.clone(),
    ));
    let predictor = Arc::new(Predictor::new(store.clone(), artifacts));

    match cli.command {
        Commands::Train => {
            let result = tokio::task::spawn_blocking(move || trainer.train()).await?;
            match result {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) if e.is_no_data() => {
                    warn!("Nothing to train on; load transactions first");
                    let response = CommandResponse::from_training(Err(e));
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                Err(e) => return Err(e).context("Training failed"),
            }
        }
        Commands::Predict { flagged_only } => {
            let result = tokio::task::spawn_blocking(move || predictor.predict()).await?;
            match result {
                Ok(output) if flagged_only => {
                    println!("{}", serde_json::to_string_pretty(&output.flagged)?)
                }
                Ok(output) => println!("{}", serde_json::to_string_pretty(&output)?),
                Err(e) if e.is_model_not_found() => bail!(
                    "no trained model at {}; run `fraud-model train` first",
                    config.artifact.path.display()
                ),
                Err(e) => return Err(e).context("Prediction failed"),
            }
        }
        Commands::List {
            offset,
            limit,
            fraud,
        } => {
            let page = store
                .list(offset, limit, fraud)
                .context("Failed to list transactions")?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Serve => serve(&config, trainer, predictor).await?,
    }

    Ok(())
}

async fn serve(config: &AppConfig, trainer: Arc<Trainer>, predictor: Arc<Predictor>) -> Result<()> {
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = CommandConsumer::new(
        client.clone(),
        &config.nats.train_subject,
        &config.nats.predict_subject,
    );
    let producer = ReplyProducer::new(client);
    let mut requests = consumer.subscribe().await?;

    info!(
        artifact = %config.artifact.path.display(),
        store = %config.store.transactions_path.display(),
        "Serving train/predict requests"
    );

    loop {
        let (command, message) = tokio::select! {
            next = requests.next() => match next {
                Some(request) => request,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let trainer = trainer.clone();
        let predictor = predictor.clone();
        let producer = producer.clone();

        // Training is serialized by the trainer itself; scoring runs concurrently
        tokio::spawn(async move {
            let started = Instant::now();
            let response = match command {
                Command::Train => tokio::task::spawn_blocking(move || trainer.train())
                    .await
                    .map(CommandResponse::from_training),
                Command::Predict => tokio::task::spawn_blocking(move || predictor.predict())
                    .await
                    .map(CommandResponse::from_prediction),
            }
            .unwrap_or_else(|e| CommandResponse::error("internal", e.to_string()));

            info!(
                command = command.name(),
                ok = response.is_ok(),
                elapsed_ms = started.elapsed().as_millis(),
                "Command handled"
            );

            if let Err(e) = producer.reply(&message, &response).await {
                error!(command = command.name(), error = %e, "Failed to publish reply");
            }
        });
    }

    info!("Server shutting down...");
    Ok(())
}
