//! Synchronizes return series on the trading dates they share.
//!
//! Instruments listed on different exchanges do not trade on the same calendar, so series
//! are never truncated by position. Each series becomes a `day`/`return` frame and the
//! frames are inner-joined on `day`, which leaves exactly the dates present in every
//! series.
use chrono::NaiveDate;
use log::debug;
use nalgebra::{DMatrix, DVector};
use polars::prelude::{DataFrame, DataFrameJoinOps, JoinArgs, JoinType, SortMultipleOptions};

use crate::risk::RiskError;
use crate::traits::{AsDataFrame, DAY_COLUMN, RETURN_COLUMN};
use crate::types::ReturnSeries;

const BENCHMARK_COLUMN: &str = "benchmark";

/// Return data restricted to the dates common to every series under analysis
#[derive(Debug, Clone)]
pub struct AlignedReturns {
    /// Common trading dates in ascending order
    pub dates: Vec<NaiveDate>,

    /// T×N matrix; row `j` is the cross-section on `dates[j]`, column `i` is instrument `i`
    pub returns: DMatrix<f64>,

    /// Benchmark returns on `dates`, when a benchmark was supplied
    pub benchmark: Option<DVector<f64>>,
}

impl AlignedReturns {
    /// Number of common dates (T)
    pub fn observations(&self) -> usize {
        self.returns.nrows()
    }

    /// Number of instruments (N)
    pub fn instruments(&self) -> usize {
        self.returns.ncols()
    }
}

/// Sample statistics need at least two observations
pub const MIN_OBSERVATIONS: usize = 2;

/// Intersect the dates of every series and build the synchronized return matrix.
///
/// # Arguments
/// * `series` - One return series per instrument, in instrument order
/// * `benchmark` - Optional benchmark series, aligned to the same dates
/// * `min_common_dates` - Minimum size of the intersection, never less than [`MIN_OBSERVATIONS`]
///
/// # Errors
/// * [`RiskError::InvalidInput`] - If no series are supplied or any series is empty
/// * [`RiskError::InsufficientData`] - If fewer than `min_common_dates` dates are shared
/// * [`RiskError::Alignment`] - If the intermediate frames cannot be built or joined
pub fn align_returns(
    series: &[&ReturnSeries],
    benchmark: Option<&ReturnSeries>,
    min_common_dates: usize,
) -> Result<AlignedReturns, RiskError> {
    if series.is_empty() {
        return Err(RiskError::InvalidInput("At least one return series is required".to_string()));
    }
    if let Some(position) = series.iter().position(|s| s.is_empty()) {
        return Err(RiskError::InvalidInput(format!("Return series at position {} is empty", position)));
    }
    if benchmark.is_some_and(|b| b.is_empty()) {
        return Err(RiskError::InvalidInput("Benchmark return series is empty".to_string()));
    }

    let mut joined = named_frame(series[0], &instrument_column(0))?;
    for (i, s) in series.iter().enumerate().skip(1) {
        joined = inner_join(&joined, &named_frame(s, &instrument_column(i))?)?;
    }
    if let Some(b) = benchmark {
        joined = inner_join(&joined, &named_frame(b, BENCHMARK_COLUMN)?)?;
    }

    let found = joined.height();
    debug!(
        "Aligned {} series{} on {} common dates",
        series.len(),
        if benchmark.is_some() { " and a benchmark" } else { "" },
        found
    );
    let required = min_common_dates.max(MIN_OBSERVATIONS);
    if found < required {
        return Err(RiskError::InsufficientData { found, required });
    }

    let joined = joined.sort([DAY_COLUMN], SortMultipleOptions::default())?;

    let dates = joined
        .column(DAY_COLUMN)?
        .i32()?
        .into_iter()
        .map(|days| {
            days.and_then(NaiveDate::from_num_days_from_ce_opt)
                .ok_or_else(|| RiskError::InvalidInput(format!("Aligned day {:?} is not a valid date", days)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        columns.push(column_values(&joined, &instrument_column(i))?);
    }
    let returns = DMatrix::from_fn(found, series.len(), |row, col| columns[col][row]);

    let benchmark = match benchmark {
        Some(_) => Some(DVector::from_vec(column_values(&joined, BENCHMARK_COLUMN)?)),
        None => None,
    };

    Ok(AlignedReturns { dates, returns, benchmark })
}

fn instrument_column(index: usize) -> String {
    format!("r{}", index)
}

/// Frame of a series with its return column renamed so joined frames stay distinguishable
fn named_frame(series: &ReturnSeries, name: &str) -> Result<DataFrame, RiskError> {
    let mut df = series.as_dataframe()?;
    df.rename(RETURN_COLUMN, name)?;
    Ok(df)
}

fn inner_join(left: &DataFrame, right: &DataFrame) -> Result<DataFrame, RiskError> {
    let joined = left.join(right, [DAY_COLUMN], [DAY_COLUMN], JoinArgs::new(JoinType::Inner))?;
    Ok(joined)
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, RiskError> {
    // a null cannot survive an inner join; NaN is left to the non-finite checks downstream
    Ok(df.column(name)?.f64()?.into_iter().map(|value| value.unwrap_or(f64::NAN)).collect())
}
