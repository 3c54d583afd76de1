//! Threshold estimation: empirical lower-tail quantiles (VaR) of a predicted sample.
//!
//! The quantile uses linear interpolation between order statistics at the
//! fractional rank `q * (n - 1)`, matching the conventional percentile
//! definition. The interpolation is evaluated from whichever bracketing order
//! statistic is nearer.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

/// A coverage level together with its tail probability.
///
/// The two standard levels carry their tail probability as an exact literal
/// (`0.05`, `0.01`) rather than as `1.0 - confidence`, which is not exactly
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceLevel {
    confidence: f64,
    alpha: f64,
}

impl ConfidenceLevel {
    pub const P95: Self = Self {
        confidence: 0.95,
        alpha: 0.05,
    };

    pub const P99: Self = Self {
        confidence: 0.99,
        alpha: 0.01,
    };

    /// Build a level from an arbitrary confidence in the open interval (0, 1).
    pub fn new(confidence: f64) -> Result<Self, BacktestError> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(BacktestError::InvalidConfidence(confidence));
        }
        Ok(Self {
            confidence,
            alpha: 1.0 - confidence,
        })
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Theoretical violation probability, `1 - confidence`.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Tail percentile in percent, e.g. 5 for the 95% level.
    pub fn tail_percentile(&self) -> f64 {
        self.alpha * 100.0
    }
}

/// VaR thresholds of one predicted sample at the two standard levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub var_95: f64,
    pub var_99: f64,
}

impl ThresholdSet {
    pub fn estimate(predicted: &[f64]) -> Result<Self, BacktestError> {
        Ok(Self {
            var_95: estimate_threshold(predicted, ConfidenceLevel::P95)?,
            var_99: estimate_threshold(predicted, ConfidenceLevel::P99)?,
        })
    }
}

/// VaR at `confidence` (e.g. 0.95): the `100 * (1 - confidence)`th percentile.
pub fn estimate_var(predicted: &[f64], confidence: f64) -> Result<f64, BacktestError> {
    estimate_threshold(predicted, ConfidenceLevel::new(confidence)?)
}

/// VaR at a prepared confidence level.
pub fn estimate_threshold(predicted: &[f64], level: ConfidenceLevel) -> Result<f64, BacktestError> {
    empirical_quantile(predicted, level.alpha())
}

/// Empirical quantile with linear interpolation, `q` in [0, 1].
///
/// Values are ordered with IEEE total ordering: a positive NaN sorts to the
/// top and a negative-signed NaN to the bottom, where it poisons the lower
/// quantiles. `Sample::validate` rejects non-finite predictions before any
/// VaR is estimated.
pub fn empirical_quantile(values: &[f64], q: f64) -> Result<f64, BacktestError> {
    if values.is_empty() {
        return Err(BacktestError::EmptySample);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let last = sorted.len() - 1;
    let rank = (q.clamp(0.0, 1.0) * last as f64).max(0.0);
    let lower = (rank.floor() as usize).min(last);
    let upper = (lower + 1).min(last);
    let weight = rank - lower as f64;

    Ok(lerp(sorted[lower], sorted[upper], weight))
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    match t.partial_cmp(&0.5) {
        Some(Ordering::Less) => a + diff * t,
        _ => b - diff * (1.0 - t),
    }
}
