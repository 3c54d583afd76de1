//! Backtest runner: thresholds, violations and coverage tests for one sample.

use crate::coverage::{kupiec_test_with, BoundaryPolicy, BoundaryPolicyKind};
use crate::domain::{BacktestResult, Sample};
use crate::error::BacktestError;
use crate::threshold::{ConfidenceLevel, ThresholdSet};
use crate::violations::count_violations;

/// Evaluates samples under a fixed boundary policy.
///
/// Holds no per-sample state; one runner can be shared across threads.
#[derive(Debug)]
pub struct BacktestRunner {
    policy: Box<dyn BoundaryPolicy>,
}

impl Default for BacktestRunner {
    fn default() -> Self {
        Self::from_kind(BoundaryPolicyKind::default())
    }
}

impl BacktestRunner {
    pub fn new(policy: Box<dyn BoundaryPolicy>) -> Self {
        Self { policy }
    }

    pub fn from_kind(kind: BoundaryPolicyKind) -> Self {
        Self::new(kind.build())
    }

    pub fn policy(&self) -> &dyn BoundaryPolicy {
        self.policy.as_ref()
    }

    /// Backtest one sample at the 95% and 99% levels.
    pub fn run(&self, sample: &Sample) -> Result<BacktestResult, BacktestError> {
        sample.validate()?;

        let thresholds = ThresholdSet::estimate(&sample.predicted)?;
        let violations_95 = count_violations(&sample.actual, thresholds.var_95)?;
        let violations_99 = count_violations(&sample.actual, thresholds.var_99)?;

        let kupiec_95 = kupiec_test_with(
            violations_95.violations,
            violations_95.n,
            ConfidenceLevel::P95.alpha(),
            self.policy.as_ref(),
        );
        let kupiec_99 = kupiec_test_with(
            violations_99.violations,
            violations_99.n,
            ConfidenceLevel::P99.alpha(),
            self.policy.as_ref(),
        );

        Ok(BacktestResult {
            instrument: sample.instrument.clone(),
            model: sample.model.clone(),
            thresholds,
            violations_95,
            violations_99,
            kupiec_95,
            kupiec_99,
        })
    }
}

/// Backtest one sample with the default (literal) boundary policy.
pub fn run_backtest(sample: &Sample) -> Result<BacktestResult, BacktestError> {
    BacktestRunner::default().run(sample)
}
