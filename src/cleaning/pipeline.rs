//! Raw table to cleaned, chronologically indexed table

use super::impute::{ImputationReport, NeighborhoodImputer};
use super::outlier::OutlierClipper;
use crate::config::{Config, DataConfig};
use crate::data::{build_time_index, CleanTable, RawTable};
use crate::error::Result;
use tracing::info;

/// What the cleaning run did besides producing the table
#[derive(Debug, Clone)]
pub struct CleaningReport {
    pub columns_kept: usize,
    pub imputation: ImputationReport,
    pub outliers_replaced: usize,
}

/// Column selection, sentinel normalization, imputation, outlier clipping
/// of the target column, then the time index.
#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    data: DataConfig,
    imputer: NeighborhoodImputer,
    clipper: OutlierClipper,
}

impl CleaningPipeline {
    pub fn new(data: DataConfig, imputer: NeighborhoodImputer, clipper: OutlierClipper) -> Self {
        Self {
            data,
            imputer,
            clipper,
        }
    }

    /// Build from configuration; an unknown outlier strategy fails here
    pub fn from_config(config: &Config) -> Result<Self> {
        let strategy = config.cleaning.strategy()?;
        Ok(Self::new(
            config.data.clone(),
            NeighborhoodImputer::new(config.cleaning.window),
            OutlierClipper::new(strategy, config.cleaning.fence_multiplier),
        ))
    }

    /// Run every stage.
    ///
    /// Columns that stay missing after imputation stop the run with
    /// `Error::IncompleteColumns` rather than reaching the models.
    pub fn run(&self, raw: &RawTable) -> Result<(CleanTable, CleaningReport)> {
        let selected =
            raw.select_columns(self.data.threshold_column.as_deref(), &self.data.drop_columns)?;
        let normalized = selected.normalize();

        let (imputed, imputation) = self.imputer.impute(&normalized);
        let complete = imputed.into_complete()?;

        let target_idx = complete.column_index(&self.data.target_column)?;
        let clipped = self.clipper.clip(&complete.column(target_idx));
        let complete = complete.with_column(target_idx, &clipped.values);

        let table = build_time_index(complete)?;

        info!(
            rows = table.n_rows(),
            columns = table.columns.len(),
            imputed = imputation.window_filled + imputation.fallback_filled,
            outliers = clipped.replaced,
            target = %self.data.target_column,
            "cleaning finished"
        );

        let report = CleaningReport {
            columns_kept: table.columns.len(),
            imputation,
            outliers_replaced: clipped.replaced,
        };
        Ok((table, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::read_raw_csv;
    use crate::error::Error;

    fn config() -> Config {
        let mut config = Config::default();
        config.data.target_column = "Wet".to_string();
        config.data.threshold_column = Some("Pressure".to_string());
        config.cleaning.window = 1;
        config
    }

    #[test]
    fn test_full_cleaning_run() {
        let csv = "\
STATION,DATE,Pressure,Wet,Sparse
X,2020-01-01T02:00:00,30.0,40,
X,2020-01-01T00:00:00,M,41,
X,2020-01-01T01:00:00,29.0,s,
X,2020-01-01T03:00:00,31.0,42,1
X,2020-01-01T04:00:00,T,400,
";
        let raw = read_raw_csv(csv.as_bytes(), "DATE").unwrap();
        let pipeline = CleaningPipeline::from_config(&config()).unwrap();
        let (table, report) = pipeline.run(&raw).unwrap();

        assert_eq!(table.columns, vec!["Pressure", "Wet"]);
        assert_eq!(table.n_rows(), 5);
        assert!(table.timestamps().windows(2).all(|w| w[0] <= w[1]));

        // file row 1 (00:00) Pressure "M" -> mean of rows 0..=2 in file order
        assert_eq!(table.rows[0].values[0], (30.0 + 29.0) / 2.0);
        // trace marker
        assert_eq!(table.rows[4].values[0], 0.0025);
        // 400 is an outlier on Wet and is replaced by the median
        assert!(table.column(1).iter().all(|&v| v < 100.0));
        assert_eq!(report.outliers_replaced, 1);
        assert_eq!(report.imputation.window_filled, 2);
    }

    #[test]
    fn test_empty_column_fails_gate() {
        let csv = "DATE,Wet,Dead\n2020-01-01,1,M\n2020-01-02,2,M\n";
        let raw = read_raw_csv(csv.as_bytes(), "DATE").unwrap();
        let mut config = config();
        config.data.threshold_column = None;

        let result = CleaningPipeline::from_config(&config).unwrap().run(&raw);
        match result {
            Err(Error::IncompleteColumns { columns }) => assert_eq!(columns, vec!["Dead"]),
            other => panic!("expected IncompleteColumns, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bad_strategy_fails_fast() {
        let mut config = config();
        config.cleaning.strategy = "average".to_string();
        assert!(matches!(
            CleaningPipeline::from_config(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_config_drops_free_text_columns() {
        let csv = "\
STATION,DATE,NAME,HourlySeaLevelPressure,HourlySkyConditions,HourlyPresentWeatherType,HourlyWetBulbTemperature
72530,2020-01-01T00:51:00,CHICAGO OHARE,30.01,FEW:02 45,RA:02 |RA |,40
72530,2020-01-01T01:51:00,CHICAGO OHARE,30.02,BKN:07 12,-SN:03 |SN |,41
72530,2020-01-01T02:51:00,CHICAGO OHARE,30.03,OVC:08 9,BR:1 ||,42
";
        let raw = read_raw_csv(csv.as_bytes(), "DATE").unwrap();
        let pipeline = CleaningPipeline::from_config(&Config::default()).unwrap();
        let (table, _) = pipeline.run(&raw).unwrap();

        assert_eq!(
            table.columns,
            vec!["HourlySeaLevelPressure", "HourlyWetBulbTemperature"]
        );
        assert_eq!(table.n_rows(), 3);
    }
}
