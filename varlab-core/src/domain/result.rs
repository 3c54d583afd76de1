use serde::{Deserialize, Serialize};

use crate::coverage::KupiecOutcome;
use crate::domain::SampleKey;
use crate::threshold::ThresholdSet;
use crate::violations::ViolationCount;

/// Backtest record for one (instrument, model) pair. Never mutated after
/// the runner creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub instrument: String,
    pub model: String,
    pub thresholds: ThresholdSet,
    pub violations_95: ViolationCount,
    pub violations_99: ViolationCount,
    pub kupiec_95: KupiecOutcome,
    pub kupiec_99: KupiecOutcome,
}

impl BacktestResult {
    pub fn key(&self) -> SampleKey {
        SampleKey::new(self.instrument.clone(), self.model.clone())
    }

    /// Number of observations in the evaluated sample.
    pub fn n(&self) -> usize {
        self.violations_95.n
    }

    pub fn var_95(&self) -> f64 {
        self.thresholds.var_95
    }

    pub fn var_99(&self) -> f64 {
        self.thresholds.var_99
    }

    pub fn viol_rate_95(&self) -> f64 {
        self.violations_95.rate
    }

    pub fn viol_rate_99(&self) -> f64 {
        self.violations_99.rate
    }

    pub fn kupiec_lr_95(&self) -> f64 {
        self.kupiec_95.lr()
    }

    pub fn kupiec_p95(&self) -> f64 {
        self.kupiec_95.p_value()
    }

    pub fn kupiec_lr_99(&self) -> f64 {
        self.kupiec_99.lr()
    }

    pub fn kupiec_p99(&self) -> f64 {
        self.kupiec_99.p_value()
    }
}
