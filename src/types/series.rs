use std::collections::BTreeMap;
use std::collections::btree_map::Iter;

use chrono::{Datelike, NaiveDate};
use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use serde::{Deserialize, Serialize};

use crate::traits::{AsDataFrame, DAY_COLUMN, RETURN_COLUMN};

/// How consecutive closing prices are turned into a return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    /// `ln(current / previous)`
    #[default]
    Log,
    /// `(current - previous) / previous`
    Simple,
}

impl ReturnKind {
    fn apply(&self, previous: f64, current: f64) -> f64 {
        match self {
            ReturnKind::Log => (current / previous).ln(),
            ReturnKind::Simple => (current - previous) / previous,
        }
    }
}

/// Daily returns for a single instrument, keyed by trading date.
///
/// Dates are unique and iteration is always chronological, regardless of the order in
/// which returns were inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSeries(BTreeMap<NaiveDate, f64>);

impl ReturnSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive returns from a map of closing prices.
    ///
    /// Each return is keyed by the later date of the pair it was computed from, so the
    /// first close never produces a return. Non-positive or non-finite closes are skipped
    /// entirely; the next valid close is compared against the last valid one.
    ///
    /// # Arguments
    /// * `closes` - Closing prices keyed by trading date
    /// * `kind` - Whether to produce log or simple returns
    pub fn from_closes(closes: &BTreeMap<NaiveDate, f64>, kind: ReturnKind) -> Self {
        let valid = closes
            .iter()
            .filter(|(_, close)| close.is_finite() && **close > 0.0)
            .collect::<Vec<_>>();

        let returns = valid
            .windows(2)
            .map(|window| {
                let [(_, previous), (date, current)] = window else { unreachable!() };
                (**date, kind.apply(**previous, **current))
            })
            .collect();

        ReturnSeries(returns)
    }

    pub fn insert(&mut self, date: NaiveDate, value: f64) -> Option<f64> {
        self.0.insert(date, value)
    }

    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.0.get(date).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.0.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.0.keys().next_back().copied()
    }

    pub fn iter(&self) -> Iter<'_, NaiveDate, f64> {
        self.0.iter()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.values().copied()
    }
}

impl AsDataFrame for ReturnSeries {
    /// Two column frame of `day` (days since the common era) and `return`, sorted by day
    fn as_dataframe(&self) -> PolarsResult<DataFrame> {
        let days = self.dates().map(|date| date.num_days_from_ce()).collect::<Vec<i32>>();
        let returns = self.values().collect::<Vec<f64>>();

        DataFrame::new(vec![
            Series::new(DAY_COLUMN, days),
            Series::new(RETURN_COLUMN, returns),
        ])
    }
}

impl FromIterator<(NaiveDate, f64)> for ReturnSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        ReturnSeries(iter.into_iter().collect())
    }
}

impl From<BTreeMap<NaiveDate, f64>> for ReturnSeries {
    fn from(map: BTreeMap<NaiveDate, f64>) -> Self {
        ReturnSeries(map)
    }
}

impl<'a> IntoIterator for &'a ReturnSeries {
    type Item = (&'a NaiveDate, &'a f64);
    type IntoIter = Iter<'a, NaiveDate, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
