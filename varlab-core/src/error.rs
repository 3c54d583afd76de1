//! Error types for the backtesting engine.
//!
//! Only invalid inputs are errors. Degenerate statistics are carried as data
//! (`KupiecOutcome`), and missing cohort data is `None`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
}

/// Errors raised while validating or evaluating a sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("sample is empty")]
    EmptySample,

    #[error("length mismatch: {actual} actual values vs {predicted} predicted values")]
    LengthMismatch { actual: usize, predicted: usize },

    #[error("predicted value {value} at row {index} is not finite")]
    NonFinitePrediction { index: usize, value: f64 },

    #[error("confidence must lie strictly between 0 and 1, got {0}")]
    InvalidConfidence(f64),

    #[error("no candidate models to rank")]
    NoCandidates,

    #[error("instrument '{instrument}' is assigned to both '{first}' and '{second}'")]
    DuplicateMembership {
        instrument: String,
        first: String,
        second: String,
    },
}

impl BacktestError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}
