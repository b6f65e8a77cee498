use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use polars::prelude::{DataFrame, DataType, NamedFrom, Series};
use polars_io::prelude::{CsvReadOptions, CsvWriter};
use polars_io::{SerReader, SerWriter};

use crate::markets::{ProviderError, ReturnSeriesProvider};
use crate::serialization::DATE_FORMAT;
use crate::types::ReturnSeries;

const DATE_COLUMN: &str = "date";
const RETURN_COLUMN: &str = "return";

/// Return series persisted as CSV files.
///
/// Each instrument lives in `<dir>/<MARKET>/<TICKER>.csv` with a `date` column formatted as
/// `YYYY-MM-DD` and a `return` column. Rows may appear in any order.
#[derive(Debug, Clone)]
pub struct CsvReturnStore {
    dir: PathBuf,
}

impl CsvReturnStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, ticker: &str, market: &str) -> PathBuf {
        self.dir
            .join(market.trim().to_uppercase())
            .join(format!("{}.csv", ticker.trim().to_uppercase()))
    }

    /// Write a return series to disk, replacing any existing file
    ///
    /// # Errors
    /// * If the market directory cannot be created
    /// * If there are any IO errors while writing
    pub fn save(&self, ticker: &str, market: &str, series: &ReturnSeries) -> Result<(), ProviderError> {
        let file_path = self.file_path(ticker, market);
        if let Some(parent) = file_path.parent() {
            create_dir_all(parent)?;
        }

        let dates = series
            .dates()
            .map(|date| date.format(DATE_FORMAT).to_string())
            .collect::<Vec<_>>();
        let returns = series.values().collect::<Vec<_>>();
        let mut df = DataFrame::new(vec![
            Series::new(DATE_COLUMN, dates),
            Series::new(RETURN_COLUMN, returns),
        ])?;

        let file = File::create(&file_path)?;
        CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df)?;

        debug!("Saved {} returns to {}", series.len(), file_path.display());
        Ok(())
    }

    /// Read a return series from disk
    ///
    /// # Errors
    /// * [`ProviderError::NotFound`] - If there is no file for the instrument
    /// * [`ProviderError::Malformed`] - If a date cannot be parsed
    /// * If the file is not a valid CSV with `date` and `return` columns
    pub fn load(&self, ticker: &str, market: &str) -> Result<ReturnSeries, ProviderError> {
        let file_path = self.file_path(ticker, market);
        if !file_path.is_file() {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(file_path.clone()))?
            .finish()?;

        // a column of whole numbers is inferred as integers
        let returns = df.column(RETURN_COLUMN)?.cast(&DataType::Float64)?;
        let dates = df.column(DATE_COLUMN)?.cast(&DataType::String)?;

        let mut series = ReturnSeries::new();
        for (raw_date, value) in dates.str()?.into_iter().zip(returns.f64()?.into_iter()) {
            let (Some(raw_date), Some(value)) = (raw_date, value) else {
                warn!("Skipping incomplete row in {}", file_path.display());
                continue;
            };
            let date = NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT).map_err(|e| {
                ProviderError::Malformed(format!("{} in {}: {}", raw_date, file_path.display(), e))
            })?;
            series.insert(date, value);
        }

        if series.is_empty() {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }

        debug!("Loaded {} returns from {}", series.len(), file_path.display());
        Ok(series)
    }
}

#[async_trait]
impl ReturnSeriesProvider for CsvReturnStore {
    fn name(&self) -> &str {
        "CSV"
    }

    async fn daily_returns(&self, ticker: &str, market: &str) -> Result<ReturnSeries, ProviderError> {
        self.load(ticker, market)
    }
}
