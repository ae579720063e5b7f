//! Command line entry point
//!
//! Usage:
//!   climate-ml clean raw.csv cleaned.csv
//!   climate-ml train cleaned.csv --model-dir models
//!   climate-ml predict features.csv --model-dir models

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use climate_ml::data::{inference_features, load_clean_csv, load_raw_csv, save_clean_csv};
use climate_ml::ensemble::{EnsembleModel, Metrics};
use climate_ml::{CleaningPipeline, Config, Dataset};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weather station cleaning and ensemble forecasting")]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a raw observation export
    Clean {
        /// Raw CSV export
        input: PathBuf,
        /// Cleaned CSV to write
        output: PathBuf,
    },
    /// Train and evaluate the ensemble on a cleaned table
    Train {
        /// Cleaned CSV written by `clean`
        input: PathBuf,
        /// Directory for model artifacts and metrics
        #[arg(short, long, default_value = "models")]
        model_dir: PathBuf,
        /// Override the number of LSTM epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the number of trees
        #[arg(long)]
        trees: Option<usize>,
    },
    /// Forecast from a feature table without the target column
    Predict {
        /// Feature CSV with a timestamp column
        input: PathBuf,
        /// Directory holding trained artifacts
        #[arg(short, long, default_value = "models")]
        model_dir: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn clean(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let raw = load_raw_csv(input, &config.data.timestamp_column)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let pipeline = CleaningPipeline::from_config(config)?;
    let (table, report) = pipeline.run(&raw)?;

    save_clean_csv(&table, output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Rows:               {}", table.n_rows());
    println!("Columns kept:       {}", report.columns_kept);
    println!("Window-filled:      {}", report.imputation.window_filled);
    println!("Mean-filled:        {}", report.imputation.fallback_filled);
    println!("Outliers replaced:  {}", report.outliers_replaced);
    Ok(())
}

fn train(config: &Config, input: &Path, model_dir: &Path) -> Result<()> {
    let table = load_clean_csv(input, &config.data.timestamp_column)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let dataset = Dataset::from_table(&table, &config.data.target_column)?;
    let split = dataset.split(&config.split);

    println!(
        "Dataset: {} samples, {} features",
        dataset.n_samples(),
        dataset.n_features()
    );
    println!("Train set: {} samples", split.train.n_samples());
    println!("Test set:  {} samples\n", split.test.n_samples());

    let start_time = std::time::Instant::now();
    let model = EnsembleModel::train(&split, config)?;
    info!(
        seconds = start_time.elapsed().as_secs_f64(),
        "training finished"
    );

    let evaluation = model.evaluate(&split.test)?;
    model
        .save(model_dir)
        .with_context(|| format!("failed to save models to {}", model_dir.display()))?;
    evaluation.metrics.save(model_dir)?;

    println!("\n=== Evaluation ===\n");
    println!("Forest MSE:   {:.6}", evaluation.metrics.forest_mse);
    println!("LSTM MSE:     {:.6}", evaluation.metrics.lstm_mse);
    println!("Combined MSE: {:.6}", evaluation.metrics.combined_mse);

    println!("\n=== Feature Importance Ranking ===\n");
    for (i, (name, imp)) in model
        .forest()
        .feature_importance_ranking()
        .iter()
        .take(15)
        .enumerate()
    {
        let bar = "█".repeat((imp * 40.0) as usize);
        println!("{:2}. {:30} {:.4} {}", i + 1, name, imp, bar);
    }
    Ok(())
}

fn predict(config: &Config, input: &Path, model_dir: &Path) -> Result<()> {
    let model = EnsembleModel::load(model_dir)
        .with_context(|| format!("failed to load models from {}", model_dir.display()))?;
    if let Ok(metrics) = Metrics::load(model_dir) {
        info!(combined_mse = metrics.combined_mse, "loaded model metrics");
    }

    let raw = load_raw_csv(input, &config.data.timestamp_column)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let x = inference_features(&raw, model.feature_names())?;
    let predictions = model.predict(&x)?;

    if predictions.is_empty() {
        println!(
            "No forecasts: {} rows do not exceed the {}-step window",
            x.nrows(),
            model.time_steps()
        );
        return Ok(());
    }

    println!("row,prediction");
    for (j, p) in predictions.iter().enumerate() {
        println!("{},{:.4}", j + model.time_steps(), p);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    match &args.command {
        Command::Clean { input, output } => clean(&config, input, output),
        Command::Train {
            input,
            model_dir,
            epochs,
            trees,
        } => {
            if let Some(epochs) = epochs {
                config.sequence.epochs = *epochs;
            }
            if let Some(trees) = trees {
                config.forest.n_trees = *trees;
            }
            config.validate()?;
            train(&config, input, model_dir)
        }
        Command::Predict { input, model_dir } => predict(&config, input, model_dir),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("climate_ml=info")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        if let Some(lib_err) = err.downcast_ref::<climate_ml::Error>() {
            if lib_err.is_data_error() {
                error!("input data rejected: {}", lib_err);
            }
        }
        return Err(err);
    }
    Ok(())
}
