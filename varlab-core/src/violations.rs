//! Violation counting: how often actual values fall below a VaR threshold.

use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

/// Number and share of observations strictly below a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViolationCount {
    pub violations: usize,
    pub n: usize,
    pub rate: f64,
}

/// Count `actual` values strictly less than `threshold`.
///
/// A value equal to the threshold is not a violation.
pub fn count_violations(actual: &[f64], threshold: f64) -> Result<ViolationCount, BacktestError> {
    let n = actual.len();
    if n == 0 {
        return Err(BacktestError::EmptySample);
    }

    let violations = actual.iter().filter(|&&x| x < threshold).count();

    Ok(ViolationCount {
        violations,
        n,
        rate: violations as f64 / n as f64,
    })
}
