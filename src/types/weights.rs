use crate::risk::RiskError;

/// Build an equally weighted allocation for `count` instruments
pub fn equal_weights(count: usize) -> Vec<f64> {
    if count == 0 {
        return vec![];
    }
    vec![1.0 / count as f64; count]
}

/// Check that a weight vector describes a fully invested, long-only allocation.
///
/// # Arguments
/// * `weights` - Portfolio weights, index-aligned to the instrument list
/// * `expected_len` - Number of instruments the weights must cover
/// * `tolerance` - Allowed absolute deviation of the weight sum from 1.0
///
/// # Errors
/// * [`RiskError::InvalidInput`] - If the vector is empty, has the wrong length, contains a
///   weight outside of (0, 1], or does not sum to 1.0 within `tolerance`
pub fn validate_weights(weights: &[f64], expected_len: usize, tolerance: f64) -> Result<(), RiskError> {
    if weights.is_empty() {
        return Err(RiskError::InvalidInput("Weights cannot be empty".to_string()));
    }

    if weights.len() != expected_len {
        return Err(RiskError::InvalidInput(format!(
            "Number of weights must match number of instruments. Got {} weights for {} instruments",
            weights.len(),
            expected_len
        )));
    }

    if let Some(weight) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0 || **w > 1.0) {
        return Err(RiskError::InvalidInput(format!(
            "Each weight must be between 0 (exclusive) and 1.0 (inclusive). Got: {}",
            weight
        )));
    }

    let sum = weights.iter().sum::<f64>();
    if (sum - 1.0).abs() > tolerance {
        return Err(RiskError::InvalidInput(format!(
            "Weights must sum to 1.0 (±{} tolerance). Got sum: {}",
            tolerance, sum
        )));
    }

    Ok(())
}
