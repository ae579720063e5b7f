//! Random forest + LSTM ensemble
//!
//! The forest predicts every row on its own; the LSTM predicts the row that
//! follows each window of `T` rows. The first sequence prediction therefore
//! lines up with row `T` of the same span, and the combined forecast averages
//! `row[j + T]` with `seq[j]`.

use crate::config::Config;
use crate::data::{Dataset, Split};
use crate::error::{Error, Result};
use crate::model::{ForestConfig, LSTMConfig, RandomForest, LSTM};
use crate::preprocessing::{Preprocessor, SequenceGenerator};
use crate::utils::mse;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Random forest artifact file inside a model directory
pub const FOREST_FILE: &str = "forest.bin";
/// LSTM artifact file inside a model directory
pub const LSTM_FILE: &str = "lstm.bin";
/// Evaluation metrics file inside a model directory
pub const METRICS_FILE: &str = "metrics.json";

/// Average the two prediction streams.
///
/// `row_pred` covers every row of a span and `seq_pred` every window of
/// `time_steps` rows over the same span, so `seq_pred` must be exactly
/// `time_steps` shorter. A span of at most `time_steps` rows has no windows
/// and combines to nothing.
pub fn combine(row_pred: &[f64], seq_pred: &[f64], time_steps: usize) -> Result<Vec<f64>> {
    if row_pred.len().saturating_sub(time_steps) != seq_pred.len() {
        return Err(Error::Alignment {
            row_len: row_pred.len(),
            seq_len: seq_pred.len(),
            time_steps,
        });
    }

    Ok(seq_pred
        .iter()
        .enumerate()
        .map(|(j, seq)| (row_pred[j + time_steps] + seq) / 2.0)
        .collect())
}

/// Forest fitted behind the shared preprocessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestPipeline {
    pub preprocessor: Preprocessor,
    pub forest: RandomForest,
}

impl ForestPipeline {
    /// Predict raw (unscaled, possibly NaN) feature rows
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let scaled = self.preprocessor.transform(x)?;
        self.forest.predict(&scaled)
    }
}

#[derive(Serialize)]
struct ForestArtifactRef<'a> {
    time_steps: usize,
    pipeline: &'a ForestPipeline,
}

#[derive(Deserialize)]
struct ForestArtifact {
    time_steps: usize,
    pipeline: ForestPipeline,
}

/// Summary written to `metrics.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    /// MSE of the averaged forecast against `y_test[T..]`
    pub combined_mse: f64,
    /// MSE of the forest alone over the same rows
    pub forest_mse: f64,
    /// MSE of the LSTM alone
    pub lstm_mse: f64,
    pub n_test: usize,
    pub n_combined: usize,
    pub time_steps: usize,
}

/// Held-out predictions and their metrics
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub combined: Vec<f64>,
    /// `y_test[T..]`
    pub targets: Vec<f64>,
    pub metrics: Metrics,
}

/// Fitted ensemble; read-only once trained or loaded
#[derive(Debug, Clone)]
pub struct EnsembleModel {
    rows: ForestPipeline,
    lstm: LSTM,
    time_steps: usize,
}

impl EnsembleModel {
    /// Fit the preprocessor on the training split, then train the forest and
    /// the LSTM concurrently on the scaled rows.
    ///
    /// The test split only supplies the per-epoch validation loss.
    pub fn train(split: &Split, config: &Config) -> Result<Self> {
        let train = &split.train;
        let time_steps = config.sequence.time_steps;
        if train.n_samples() <= time_steps {
            return Err(Error::InsufficientData(format!(
                "{} training rows cannot form windows of {} steps",
                train.n_samples(),
                time_steps
            )));
        }

        let x_train = train.features_array();
        let preprocessor = Preprocessor::fit(&x_train)?;
        let x_scaled = preprocessor.transform(&x_train)?;

        let generator = SequenceGenerator::new(time_steps, config.sequence.batch_size);
        let (windows, targets) = generator.prepare(&x_scaled, &train.labels)?;
        let batches = generator.batches(&windows, &targets);

        let validation = if split.test.n_samples() > time_steps {
            let x_test = preprocessor.transform(&split.test.features_array())?;
            Some(generator.prepare(&x_test, &split.test.labels)?)
        } else {
            None
        };

        info!(
            train_rows = train.n_samples(),
            windows = windows.shape()[0],
            features = train.n_features(),
            "training forest and lstm"
        );

        let mut forest = RandomForest::new(ForestConfig::from(&config.forest));
        let mut lstm = LSTM::new(LSTMConfig::from_settings(
            train.n_features(),
            &config.sequence,
        ));
        let epochs = config.sequence.epochs;

        let (forest_fit, lstm_fit) = rayon::join(
            || forest.fit(&x_scaled, &train.labels, &train.feature_names),
            || {
                lstm.train(
                    &batches,
                    epochs,
                    validation.as_ref().map(|(x, y)| (x, y)),
                )
            },
        );
        forest_fit?;
        lstm_fit?;

        Ok(Self {
            rows: ForestPipeline {
                preprocessor,
                forest,
            },
            lstm,
            time_steps,
        })
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn feature_names(&self) -> &[String] {
        self.rows.forest.feature_names()
    }

    pub fn forest(&self) -> &RandomForest {
        &self.rows.forest
    }

    pub fn lstm(&self) -> &LSTM {
        &self.lstm
    }

    /// Both prediction streams over a span of raw feature rows
    fn streams(&self, x: &Array2<f64>) -> Result<(Vec<f64>, Vec<f64>)> {
        let scaled = self.rows.preprocessor.transform(x)?;
        let row_pred = self.rows.forest.predict(&scaled)?;

        let generator = SequenceGenerator::new(self.time_steps, 1);
        let windows: Array3<f64> = generator.windows(&scaled);
        let seq_pred = self.lstm.predict(&windows)?;
        Ok((row_pred, seq_pred))
    }

    /// Combined forecasts for rows `T..n` of a chronologically ordered
    /// feature table. At most `T` rows give an empty result.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if x.nrows() <= self.time_steps {
            // still reject a table with the wrong columns
            self.rows.preprocessor.transform(x)?;
            return Ok(Vec::new());
        }
        let (row_pred, seq_pred) = self.streams(x)?;
        combine(&row_pred, &seq_pred, self.time_steps)
    }

    /// Score the combined forecast on the test split
    ///
    /// A split of at most `T` rows has nothing to score and is rejected with
    /// `Error::InsufficientData`.
    pub fn evaluate(&self, test: &Dataset) -> Result<Evaluation> {
        if test.n_samples() <= self.time_steps {
            warn!(
                test_rows = test.n_samples(),
                time_steps = self.time_steps,
                "test split too short for any window"
            );
            return Err(Error::InsufficientData(format!(
                "{} test rows cannot form windows of {} steps",
                test.n_samples(),
                self.time_steps
            )));
        }

        let x = test.features_array();
        let (row_pred, seq_pred) = self.streams(&x)?;
        let combined = combine(&row_pred, &seq_pred, self.time_steps)?;

        let offset = self.time_steps;
        let targets = test.labels[offset..].to_vec();

        let metrics = Metrics {
            combined_mse: mse(&targets, &combined),
            forest_mse: mse(&targets, &row_pred[offset..]),
            lstm_mse: mse(&targets, &seq_pred),
            n_test: test.n_samples(),
            n_combined: combined.len(),
            time_steps: self.time_steps,
        };
        info!(
            combined_mse = metrics.combined_mse,
            forest_mse = metrics.forest_mse,
            lstm_mse = metrics.lstm_mse,
            "ensemble evaluated"
        );

        Ok(Evaluation {
            combined,
            targets,
            metrics,
        })
    }

    /// Write `forest.bin` and `lstm.bin` into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let artifact = ForestArtifactRef {
            time_steps: self.time_steps,
            pipeline: &self.rows,
        };
        std::fs::write(dir.join(FOREST_FILE), bincode::serialize(&artifact)?)?;
        self.lstm.save(&dir.join(LSTM_FILE))?;
        Ok(())
    }

    /// Load a model directory written by [`EnsembleModel::save`]
    pub fn load(dir: &Path) -> Result<Self> {
        let data = std::fs::read(dir.join(FOREST_FILE))?;
        let artifact: ForestArtifact = bincode::deserialize(&data)?;
        let lstm = LSTM::load(&dir.join(LSTM_FILE))?;

        if lstm.config.input_size != artifact.pipeline.preprocessor.n_features() {
            return Err(Error::ShapeMismatch(format!(
                "lstm expects {} features, forest pipeline {}",
                lstm.config.input_size,
                artifact.pipeline.preprocessor.n_features()
            )));
        }

        Ok(Self {
            rows: artifact.pipeline,
            lstm,
            time_steps: artifact.time_steps,
        })
    }
}

impl Metrics {
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(METRICS_FILE), json)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(METRICS_FILE))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn dataset(n: usize) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut data = Dataset::new(vec!["temp".into(), "humidity".into()]);
        for i in 0..n {
            let temp = 20.0 + 5.0 * (i as f64 * 0.2).sin();
            let humidity = 60.0 + 10.0 * (i as f64 * 0.1).cos();
            data.add_sample(
                vec![temp, humidity],
                0.7 * temp + 0.05 * humidity,
                start + Duration::hours(i as i64),
            );
        }
        data
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.sequence.time_steps = 4;
        config.sequence.epochs = 3;
        config.sequence.batch_size = 8;
        config.sequence.hidden_size = 6;
        config.forest.n_trees = 5;
        config.forest.max_depth = 5;
        config
    }

    #[test]
    fn test_combine_alignment() {
        let row: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let seq = vec![100.0, 101.0, 102.0, 103.0, 104.0];

        let combined = combine(&row, &seq, 10).unwrap();
        assert_eq!(combined.len(), 5);
        assert_relative_eq!(combined[0], (row[10] + seq[0]) / 2.0);
        assert_relative_eq!(combined[4], (14.0 + 104.0) / 2.0);
    }

    #[test]
    fn test_combine_rejects_misaligned_streams() {
        let row = vec![0.0; 15];
        let seq = vec![0.0; 6];
        assert!(matches!(
            combine(&row, &seq, 10),
            Err(Error::Alignment {
                row_len: 15,
                seq_len: 6,
                time_steps: 10
            })
        ));
    }

    #[test]
    fn test_combine_short_span_is_empty() {
        assert!(combine(&[1.0; 5], &[], 10).unwrap().is_empty());
        assert!(combine(&[1.0; 10], &[], 10).unwrap().is_empty());
    }

    #[test]
    fn test_train_evaluate_predict() {
        let config = small_config();
        let split = dataset(80).split(&config.split);
        let model = EnsembleModel::train(&split, &config).unwrap();

        let evaluation = model.evaluate(&split.test).unwrap();
        assert_eq!(evaluation.combined.len(), split.test.n_samples() - 4);
        assert_eq!(evaluation.targets, split.test.labels[4..].to_vec());
        assert!(evaluation.metrics.combined_mse.is_finite());
        assert_eq!(evaluation.metrics.n_combined, evaluation.combined.len());

        let x = split.test.features_array();
        assert_eq!(model.predict(&x).unwrap(), evaluation.combined);
    }

    #[test]
    fn test_trained_streams_align_at_ten_steps() {
        let mut config = small_config();
        config.sequence.time_steps = 10;
        let split = dataset(100).split(&config.split);
        let model = EnsembleModel::train(&split, &config).unwrap();

        let x = split.test.features_array();
        let (row_pred, seq_pred) = model.streams(&x).unwrap();
        assert_eq!(row_pred.len(), split.test.n_samples());
        assert_eq!(seq_pred.len(), split.test.n_samples() - 10);

        let evaluation = model.evaluate(&split.test).unwrap();
        assert_eq!(evaluation.combined.len(), split.test.n_samples() - 10);
        assert_relative_eq!(
            evaluation.combined[0],
            (row_pred[10] + seq_pred[0]) / 2.0,
            epsilon = 1e-12
        );
        assert_eq!(evaluation.targets[0], split.test.labels[10]);
    }

    #[test]
    fn test_predict_short_table_is_empty() {
        let config = small_config();
        let split = dataset(60).split(&config.split);
        let model = EnsembleModel::train(&split, &config).unwrap();

        let x = dataset(3).features_array();
        assert!(model.predict(&x).unwrap().is_empty());
        assert!(model.predict(&Array2::zeros((2, 3))).is_err());
    }

    #[test]
    fn test_evaluate_without_windows_fails() {
        let config = small_config();
        let split = dataset(60).split(&config.split);
        let model = EnsembleModel::train(&split, &config).unwrap();

        assert!(matches!(
            model.evaluate(&dataset(4)),
            Err(Error::InsufficientData(_))
        ));
        assert!(model.evaluate(&dataset(5)).is_ok());
    }

    #[test]
    fn test_too_few_training_rows() {
        let config = small_config();
        let split = Split {
            train: dataset(4),
            test: dataset(2),
        };
        assert!(matches!(
            EnsembleModel::train(&split, &config),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_save_load_reproduces_predictions() {
        let config = small_config();
        let split = dataset(60).split(&config.split);
        let model = EnsembleModel::train(&split, &config).unwrap();
        let evaluation = model.evaluate(&split.test).unwrap();

        let dir = tempfile::tempdir().unwrap();
        model.save(dir.path()).unwrap();
        evaluation.metrics.save(dir.path()).unwrap();

        let loaded = EnsembleModel::load(dir.path()).unwrap();
        let x = split.test.features_array();
        assert_eq!(loaded.time_steps(), 4);
        assert_eq!(loaded.feature_names(), model.feature_names());
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
        assert_eq!(Metrics::load(dir.path()).unwrap(), evaluation.metrics);
    }
}
