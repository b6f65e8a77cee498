use log::warn;
use nalgebra::{DMatrix, DVector};

/// Standard deviations below this are treated as zero
pub const ZERO_THRESHOLD: f64 = 1e-12;

/// Pearson correlation matrix along with the columns that had to fall back to the identity
#[derive(Debug, Clone)]
pub struct Correlation {
    pub matrix: DMatrix<f64>,

    /// Column indices whose variance was zero or non-finite
    pub degenerate: Vec<usize>,
}

/// Unbiased sample covariance matrix of the columns of a T×N return matrix.
///
/// Each column is mean-centered and the result is `Xcᵀ·Xc / (T - 1)`. Requires `T >= 2`.
pub fn covariance_matrix(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let observations = returns.nrows();
    let means = (0..returns.ncols())
        .map(|col| returns.column(col).mean())
        .collect::<Vec<_>>();

    let centered = DMatrix::from_fn(observations, returns.ncols(), |row, col| {
        returns[(row, col)] - means[col]
    });

    (centered.transpose() * &centered) / (observations as f64 - 1.0)
}

/// Unbiased sample covariance of two equally long vectors
pub fn sample_covariance(x: &DVector<f64>, y: &DVector<f64>) -> f64 {
    let x_mean = x.mean();
    let y_mean = y.mean();

    let sum = x
        .iter()
        .zip(y.iter())
        .map(|(a, b)| (a - x_mean) * (b - y_mean))
        .sum::<f64>();

    sum / (x.len() as f64 - 1.0)
}

/// Normalize a covariance matrix into a Pearson correlation matrix.
///
/// A single instrument always yields `[[1.0]]`. For several instruments, a column whose
/// standard deviation is below [`ZERO_THRESHOLD`] or not finite has an undefined correlation; its row and
/// column are replaced with the identity (1.0 on the diagonal, 0.0 elsewhere) and its
/// index is reported in [`Correlation::degenerate`]. Every other entry is clamped to
/// [-1, 1] and the diagonal is exactly 1.0.
pub fn correlation_matrix(covariance: &DMatrix<f64>) -> Correlation {
    let n = covariance.nrows();
    if n == 1 {
        return Correlation { matrix: DMatrix::from_element(1, 1, 1.0), degenerate: vec![] };
    }

    let std_devs = (0..n)
        .map(|i| clean_variance(covariance[(i, i)]).sqrt())
        .collect::<Vec<_>>();

    let degenerate = std_devs
        .iter()
        .enumerate()
        .filter(|(_, std_dev)| !std_dev.is_finite() || **std_dev < ZERO_THRESHOLD)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    if !degenerate.is_empty() {
        warn!(
            "{} of {} columns have zero or non-finite variance; substituting identity correlation for them",
            degenerate.len(),
            n
        );
    }

    let matrix = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            1.0
        } else if degenerate.contains(&i) || degenerate.contains(&j) {
            0.0
        } else {
            (covariance[(i, j)] / (std_devs[i] * std_devs[j])).clamp(-1.0, 1.0)
        }
    });

    Correlation { matrix, degenerate }
}

/// Snap rounding noise just below zero to 0.0. NaN and genuinely negative values pass through
/// so their square roots surface as non-finite.
pub fn clean_variance(variance: f64) -> f64 {
    if variance < 0.0 && variance > -ZERO_THRESHOLD {
        0.0
    } else {
        variance
    }
}

/// Convert a matrix into row-major nested vectors
pub fn to_rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}
