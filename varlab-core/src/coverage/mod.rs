//! Coverage testing: Kupiec unconditional-coverage likelihood-ratio test.
//!
//! Given `x` violations in `n` trials and a theoretical violation probability
//! `alpha`, the statistic is
//!
//! ```text
//! LR = -2 ln( (1-alpha)^(n-x) alpha^x / ((1-p)^(n-x) p^x) ),   p = clamp(x/n, 1e-4, 1 - 1e-4)
//! ```
//!
//! and the p-value is `1 - F(LR)` with `F` the chi-square CDF with one degree
//! of freedom. The ratio is evaluated in product form, so for long samples the
//! likelihoods underflow and the statistic becomes NaN or infinite; such
//! results are reported as `KupiecOutcome::NonFinite`.
//!
//! Boundary cases (no violations, or all violations) are decided by a
//! `BoundaryPolicy` before the ratio is evaluated.

pub mod policy;

pub use policy::{
    BoundaryPolicy, BoundaryPolicyKind, LiteralBoundary, TextbookBoundary, UnknownPolicy,
};

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Lower clamp for the observed violation rate.
pub const P_HAT_FLOOR: f64 = 0.0001;
/// Upper clamp for the observed violation rate.
pub const P_HAT_CEIL: f64 = 0.9999;

/// Outcome of a Kupiec test.
///
/// Degenerate outcomes are explicit variants. `lr()` and `p_value()` give the
/// flat numeric encoding used in exported tables: `Boundary` is `(0, 0)` and
/// `NonFinite` reports its raw statistic with a p-value of 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KupiecOutcome {
    /// Zero or all observations violated; the ratio was not evaluated.
    Boundary,
    /// A finite statistic and its p-value.
    Computed { lr: f64, p_value: f64 },
    /// The statistic overflowed or was undefined (NaN / ±inf).
    NonFinite { lr: f64 },
}

impl KupiecOutcome {
    /// Likelihood-ratio statistic in output encoding.
    pub fn lr(&self) -> f64 {
        match *self {
            Self::Boundary => 0.0,
            Self::Computed { lr, .. } => lr,
            Self::NonFinite { lr } => lr,
        }
    }

    /// p-value in output encoding.
    pub fn p_value(&self) -> f64 {
        match *self {
            Self::Boundary | Self::NonFinite { .. } => 0.0,
            Self::Computed { p_value, .. } => p_value,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !matches!(self, Self::Computed { .. })
    }

    /// The p-value, or `None` for degenerate outcomes.
    pub fn computed_p_value(&self) -> Option<f64> {
        match *self {
            Self::Computed { p_value, .. } => Some(p_value),
            _ => None,
        }
    }

    /// Rebuild an outcome from its flat encoding (e.g. an imported table row).
    pub fn from_encoded(lr: f64, p_value: f64) -> Self {
        if !lr.is_finite() {
            Self::NonFinite { lr }
        } else if lr == 0.0 && p_value == 0.0 {
            Self::Boundary
        } else {
            Self::Computed { lr, p_value }
        }
    }

    /// Wrap a statistic, computing its p-value when it is finite.
    pub fn from_statistic(lr: f64) -> Self {
        if !lr.is_finite() {
            return Self::NonFinite { lr };
        }
        let p_value = 1.0 - chi_square_1_cdf(lr);
        if p_value.is_finite() {
            Self::Computed { lr, p_value }
        } else {
            Self::NonFinite { lr }
        }
    }
}

/// Kupiec test with the literal boundary policy.
pub fn kupiec_test(violations: usize, n: usize, alpha: f64) -> KupiecOutcome {
    kupiec_test_with(violations, n, alpha, &LiteralBoundary)
}

/// Kupiec test with an explicit boundary policy.
pub fn kupiec_test_with(
    violations: usize,
    n: usize,
    alpha: f64,
    policy: &dyn BoundaryPolicy,
) -> KupiecOutcome {
    if let Some(outcome) = policy.resolve(violations, n, alpha) {
        return outcome;
    }
    KupiecOutcome::from_statistic(likelihood_ratio(violations, n, alpha))
}

/// The LR statistic in product form, with the observed rate clamped away
/// from 0 and 1.
pub fn likelihood_ratio(violations: usize, n: usize, alpha: f64) -> f64 {
    let x = violations as f64;
    let misses = n as f64 - x;
    let p_hat = (x / n as f64).clamp(P_HAT_FLOOR, P_HAT_CEIL);

    let null_likelihood = (1.0 - alpha).powf(misses) * alpha.powf(x);
    let observed_likelihood = (1.0 - p_hat).powf(misses) * p_hat.powf(x);

    -2.0 * (null_likelihood / observed_likelihood).ln()
}

/// Chi-square CDF with one degree of freedom. Non-positive input maps to 0.
pub(crate) fn chi_square_1_cdf(x: f64) -> f64 {
    match ChiSquared::new(1.0) {
        Ok(chi) => chi.cdf(x),
        Err(_) => f64::NAN,
    }
}
