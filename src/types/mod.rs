mod series;
mod weights;

pub use series::{ReturnKind, ReturnSeries};
pub use weights::{equal_weights, validate_weights};
