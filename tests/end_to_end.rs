//! Raw export -> cleaned table -> trained ensemble -> forecasts

use climate_ml::prelude::*;
use std::fmt::Write as _;
use std::path::Path;

const HEADER: &str = "STATION,DATE,HourlyDryBulbTemperature,HourlyRelativeHumidity,\
HourlySeaLevelPressure,HourlyPrecipitation,HourlyWetBulbTemperature,Sparse";

fn timestamp(hour: usize) -> String {
    format!("2021-03-{:02}T{:02}:51:00", 1 + hour / 24, hour % 24)
}

/// Hourly export written newest first, with markers and one wet-bulb spike
fn raw_export(n: usize) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for hour in (0..n).rev() {
        let h = hour as f64;
        let dry = 50.0 + 8.0 * (h * 0.26).sin();
        let humidity = if hour % 17 == 3 {
            "M".to_string()
        } else {
            format!("{:.0}", 70.0 + 15.0 * (h * 0.13).cos())
        };
        let pressure = 30.0 + 0.2 * (h * 0.05).sin();
        let precip = match hour % 9 {
            0 => "T".to_string(),
            4 => "M".to_string(),
            _ => "0.00".to_string(),
        };
        let wet = if hour == 40 {
            "999".to_string()
        } else {
            format!("{:.1}", dry - 4.0 + 0.02 * (h * 0.13).cos())
        };
        let sparse = if hour % 50 == 0 { "1" } else { "" };
        writeln!(
            csv,
            "72530,{},{:.1},{},{:.2},{},{},{}",
            timestamp(hour),
            dry,
            humidity,
            pressure,
            precip,
            wet,
            sparse
        )
        .unwrap();
    }
    csv
}

/// Feature-only table: no target column
fn feature_export(n: usize) -> String {
    let mut csv = String::from(
        "DATE,HourlyDryBulbTemperature,HourlyRelativeHumidity,HourlySeaLevelPressure,HourlyPrecipitation\n",
    );
    for hour in 0..n {
        let h = hour as f64;
        writeln!(
            csv,
            "{},{:.1},{:.0},{:.2},{}",
            timestamp(hour),
            52.0 + 6.0 * (h * 0.3).sin(),
            72.0,
            30.05,
            if hour == 2 { "M" } else { "T" }
        )
        .unwrap();
    }
    csv
}

fn small_config() -> Config {
    let mut config = Config::default();
    config.sequence.time_steps = 5;
    config.sequence.epochs = 2;
    config.sequence.batch_size = 16;
    config.sequence.hidden_size = 4;
    config.forest.n_trees = 5;
    config.forest.max_depth = 4;
    config
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_clean_train_predict() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config();

    let raw_path = write(dir.path(), "raw.csv", &raw_export(120));
    let raw = load_raw_csv(&raw_path, "DATE").unwrap();
    let (table, report) = CleaningPipeline::from_config(&config).unwrap().run(&raw).unwrap();

    assert_eq!(
        table.columns,
        vec![
            "HourlyDryBulbTemperature",
            "HourlyRelativeHumidity",
            "HourlySeaLevelPressure",
            "HourlyPrecipitation",
            "HourlyWetBulbTemperature",
        ]
    );
    assert_eq!(table.n_rows(), 120);
    assert!(table.timestamps().windows(2).all(|w| w[0] < w[1]));
    assert_eq!(report.outliers_replaced, 1);
    assert!(report.imputation.window_filled > 0);

    let target = table.column(table.column_index("HourlyWetBulbTemperature").unwrap());
    assert!(target.iter().all(|&v| v < 100.0));

    // the cleaned file reads back to the same dataset
    let clean_path = dir.path().join("clean.csv");
    save_clean_csv(&table, &clean_path).unwrap();
    let reloaded = load_clean_csv(&clean_path, "DATE").unwrap();
    let dataset = Dataset::from_table(&table, "HourlyWetBulbTemperature").unwrap();
    assert_eq!(
        Dataset::from_table(&reloaded, "HourlyWetBulbTemperature").unwrap(),
        dataset
    );

    let split = dataset.split(&config.split);
    assert_eq!(split.test.n_samples(), 24);
    assert_eq!(split.train.n_samples(), 96);

    let model = EnsembleModel::train(&split, &config).unwrap();
    let evaluation = model.evaluate(&split.test).unwrap();
    assert_eq!(evaluation.combined.len(), 24 - 5);
    assert!(evaluation.metrics.combined_mse.is_finite());

    let model_dir = dir.path().join("models");
    model.save(&model_dir).unwrap();
    evaluation.metrics.save(&model_dir).unwrap();
    assert!(model_dir.join("forest.bin").exists());
    assert!(model_dir.join("lstm.bin").exists());
    assert!(model_dir.join("metrics.json").exists());

    let loaded = EnsembleModel::load(&model_dir).unwrap();
    let features_path = write(dir.path(), "features.csv", &feature_export(20));
    let new_raw = load_raw_csv(&features_path, "DATE").unwrap();
    let x = inference_features(&new_raw, loaded.feature_names()).unwrap();

    assert_eq!(x.dim(), (20, 4));
    assert!(x[[2, 1]].is_finite());
    assert!(x[[2, 3]].is_nan());

    let forecasts = loaded.predict(&x).unwrap();
    assert_eq!(forecasts.len(), 15);
    assert_eq!(forecasts, model.predict(&x).unwrap());
    assert!(forecasts.iter().all(|p| p.is_finite()));
}

#[test]
fn test_short_feature_table_gives_no_forecasts() {
    let config = small_config();
    let raw = climate_ml::data::read_raw_csv(raw_export(60).as_bytes(), "DATE").unwrap();
    let (table, _) = CleaningPipeline::from_config(&config).unwrap().run(&raw).unwrap();
    let dataset = Dataset::from_table(&table, "HourlyWetBulbTemperature").unwrap();
    let model = EnsembleModel::train(&dataset.split(&config.split), &config).unwrap();

    let new_raw = climate_ml::data::read_raw_csv(feature_export(4).as_bytes(), "DATE").unwrap();
    let x = inference_features(&new_raw, model.feature_names()).unwrap();
    assert!(model.predict(&x).unwrap().is_empty());

    let new_raw = climate_ml::data::read_raw_csv(feature_export(5).as_bytes(), "DATE").unwrap();
    let x = inference_features(&new_raw, model.feature_names()).unwrap();
    assert!(model.predict(&x).unwrap().is_empty());
}

#[test]
fn test_missing_feature_column_is_reported() {
    let config = small_config();
    let raw = climate_ml::data::read_raw_csv(raw_export(40).as_bytes(), "DATE").unwrap();
    let (table, _) = CleaningPipeline::from_config(&config).unwrap().run(&raw).unwrap();
    let dataset = Dataset::from_table(&table, "HourlyWetBulbTemperature").unwrap();
    let model = EnsembleModel::train(&dataset.split(&config.split), &config).unwrap();

    let csv = "DATE,HourlyDryBulbTemperature\n2021-03-01T00:51:00,50\n";
    let new_raw = climate_ml::data::read_raw_csv(csv.as_bytes(), "DATE").unwrap();
    assert!(matches!(
        inference_features(&new_raw, model.feature_names()),
        Err(Error::MissingColumn(_))
    ));
}
