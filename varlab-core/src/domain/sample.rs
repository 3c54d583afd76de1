use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

/// Identity of one (instrument, model) evaluation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    pub instrument: String,
    pub model: String,
}

impl SampleKey {
    pub fn new(instrument: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.model)
    }
}

/// Time-aligned held-out observations and model predictions for one
/// (instrument, model) pair.
///
/// Construction does not validate; `validate()` is called by the backtest
/// runner so that a bad sample fails on its own without touching others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub instrument: String,
    pub model: String,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl Sample {
    pub fn new(
        instrument: impl Into<String>,
        model: impl Into<String>,
        actual: Vec<f64>,
        predicted: Vec<f64>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            model: model.into(),
            actual,
            predicted,
        }
    }

    pub fn key(&self) -> SampleKey {
        SampleKey::new(self.instrument.clone(), self.model.clone())
    }

    /// Number of observations (length of `actual`).
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    /// Check `len(actual) == len(predicted) > 0` and that every prediction
    /// is finite. Non-finite actuals are allowed; they never count as
    /// violations.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.actual.len() != self.predicted.len() {
            return Err(BacktestError::LengthMismatch {
                actual: self.actual.len(),
                predicted: self.predicted.len(),
            });
        }
        if self.actual.is_empty() {
            return Err(BacktestError::EmptySample);
        }
        if let Some(index) = self.predicted.iter().position(|v| !v.is_finite()) {
            return Err(BacktestError::NonFinitePrediction {
                index,
                value: self.predicted[index],
            });
        }
        Ok(())
    }
}
