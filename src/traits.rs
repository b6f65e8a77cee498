use polars::prelude::{DataFrame, PolarsResult};

/// Column holding the trading date as days since the common era
pub const DAY_COLUMN: &str = "day";

/// Column holding the daily return
pub const RETURN_COLUMN: &str = "return";

pub trait AsDataFrame {
    fn as_dataframe(&self) -> PolarsResult<DataFrame>;
}
