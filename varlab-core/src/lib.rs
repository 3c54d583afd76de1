//! VarLab Core: Value-at-Risk backtesting engine.
//!
//! This crate contains the numerical core:
//! - Empirical VaR thresholds at 95% and 99%
//! - Violation counting against realized values
//! - Kupiec unconditional-coverage test with swappable boundary policies
//! - Per-sample backtest runner
//! - Per-instrument model ranking
//! - Per-cohort aggregation
//!
//! All operations are pure functions over in-memory samples. Batch
//! orchestration and file I/O live in `varlab-runner`.

pub mod aggregate;
pub mod backtest;
pub mod coverage;
pub mod domain;
pub mod error;
pub mod ranking;
pub mod threshold;
pub mod verdict;
pub mod violations;

pub use aggregate::{aggregate, CohortMembership, CohortSummary};
pub use backtest::{run_backtest, BacktestRunner};
pub use coverage::{
    kupiec_test, kupiec_test_with, BoundaryPolicy, BoundaryPolicyKind, KupiecOutcome,
};
pub use domain::{BacktestResult, Sample, SampleKey};
pub use error::{BacktestError, ErrorKind};
pub use ranking::{rank_instruments, select_best, RankingOutcome};
pub use threshold::{estimate_var, ConfidenceLevel, ThresholdSet};
pub use verdict::CalibrationVerdict;
pub use violations::{count_violations, ViolationCount};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn domain_types_are_send_sync() {
        assert_send::<Sample>();
        assert_sync::<Sample>();
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<KupiecOutcome>();
        assert_sync::<KupiecOutcome>();
    }

    #[test]
    fn runner_is_send_sync() {
        assert_send::<BacktestRunner>();
        assert_sync::<BacktestRunner>();
    }

    #[test]
    fn aggregation_types_are_send_sync() {
        assert_send::<CohortMembership>();
        assert_sync::<CohortMembership>();
        assert_send::<RankingOutcome>();
        assert_sync::<RankingOutcome>();
    }
}
