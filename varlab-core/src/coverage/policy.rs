//! Boundary policies for the Kupiec test.
//!
//! At zero violations or all-violations the closed-form ratio degenerates.
//! A policy decides what to report there; callers pick one by name through
//! `BoundaryPolicyKind`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::KupiecOutcome;

/// Decides the outcome of boundary cases before the ratio is evaluated.
///
/// Returns `None` when the regular computation should proceed.
pub trait BoundaryPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn resolve(&self, violations: usize, n: usize, alpha: f64) -> Option<KupiecOutcome>;
}

/// Reports `(LR, p) = (0, 0)` whenever `violations == 0` or `violations == n`.
///
/// Zero violations therefore read as a rejection. This matches the values in
/// previously published result tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralBoundary;

impl BoundaryPolicy for LiteralBoundary {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn resolve(&self, violations: usize, n: usize, _alpha: f64) -> Option<KupiecOutcome> {
        if violations == 0 || violations == n {
            Some(KupiecOutcome::Boundary)
        } else {
            None
        }
    }
}

/// Evaluates the log-likelihood ratio at the boundaries with `0 ln 0 = 0`.
///
/// - zero violations: `LR = -2 n ln(1 - alpha)`
/// - all violations:  `LR = -2 n ln(alpha)`
///
/// An empty sample stays a `Boundary` outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextbookBoundary;

impl BoundaryPolicy for TextbookBoundary {
    fn name(&self) -> &'static str {
        "textbook"
    }

    fn resolve(&self, violations: usize, n: usize, alpha: f64) -> Option<KupiecOutcome> {
        if n == 0 {
            return Some(KupiecOutcome::Boundary);
        }
        let n_f = n as f64;
        if violations == 0 {
            Some(KupiecOutcome::from_statistic(-2.0 * n_f * (1.0 - alpha).ln()))
        } else if violations == n {
            Some(KupiecOutcome::from_statistic(-2.0 * n_f * alpha.ln()))
        } else {
            None
        }
    }
}

/// Serializable selector for a boundary policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicyKind {
    #[default]
    Literal,
    Textbook,
}

impl BoundaryPolicyKind {
    pub fn build(self) -> Box<dyn BoundaryPolicy> {
        match self {
            Self::Literal => Box::new(LiteralBoundary),
            Self::Textbook => Box::new(TextbookBoundary),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Textbook => "textbook",
        }
    }
}

impl fmt::Display for BoundaryPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown boundary policy '{0}' (expected 'literal' or 'textbook')")]
pub struct UnknownPolicy(pub String);

impl FromStr for BoundaryPolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "literal" => Ok(Self::Literal),
            "textbook" => Ok(Self::Textbook),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}
