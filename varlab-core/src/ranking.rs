//! Model ranking: picks the best-calibrated model for each instrument.
//!
//! Candidates are ordered by three keys:
//! 1. `|ViolRate95 - 0.05|` ascending (closeness to the 95% target)
//! 2. `Kupiec_p95` descending (stronger support for correct coverage)
//! 3. `ViolRate99` ascending (more conservative 99% tail)
//!
//! Remaining ties are broken by model name, then by input position, so the
//! choice does not depend on the order in which results arrive. NaN keys sort
//! last in either direction.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::{BacktestResult, SampleKey};
use crate::error::BacktestError;
use crate::threshold::ConfidenceLevel;
use crate::verdict::CalibrationVerdict;

/// Target violation rate at the 95% level.
pub const TARGET_VIOL_RATE_95: f64 = 0.05;

/// The three ordering keys of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingKey {
    pub calibration_gap: f64,
    pub kupiec_p95: f64,
    pub viol_rate_99: f64,
}

impl RankingKey {
    pub fn of(result: &BacktestResult) -> Self {
        Self {
            calibration_gap: (result.viol_rate_95() - TARGET_VIOL_RATE_95).abs(),
            kupiec_p95: result.kupiec_p95(),
            viol_rate_99: result.viol_rate_99(),
        }
    }
}

/// Best model for one instrument, with an optional auxiliary metric attached
/// for reporting. The auxiliary metric never influences the choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingOutcome {
    pub instrument: String,
    pub best: BacktestResult,
    pub candidate_count: usize,
    pub verdict_95: CalibrationVerdict,
    pub auxiliary: Option<f64>,
}

/// Total order over candidates: `Less` means `a` ranks ahead of `b`.
pub fn compare_candidates(a: &BacktestResult, b: &BacktestResult) -> Ordering {
    let ka = RankingKey::of(a);
    let kb = RankingKey::of(b);
    ascending(ka.calibration_gap, kb.calibration_gap)
        .then_with(|| descending(ka.kupiec_p95, kb.kupiec_p95))
        .then_with(|| ascending(ka.viol_rate_99, kb.viol_rate_99))
        .then_with(|| a.model.cmp(&b.model))
}

/// All candidates, best first. Stable with respect to input order.
pub fn rank_candidates<'a, I>(results: I) -> Vec<&'a BacktestResult>
where
    I: IntoIterator<Item = &'a BacktestResult>,
{
    let mut ranked: Vec<&BacktestResult> = results.into_iter().collect();
    ranked.sort_by(|a, b| compare_candidates(a, b));
    ranked
}

/// The best candidate among the results for one instrument.
pub fn select_best<'a, I>(results: I) -> Result<&'a BacktestResult, BacktestError>
where
    I: IntoIterator<Item = &'a BacktestResult>,
{
    results
        .into_iter()
        .min_by(|a, b| compare_candidates(a, b))
        .ok_or(BacktestError::NoCandidates)
}

/// Select the best model for every instrument present in `results`.
///
/// `auxiliary` maps (instrument, model) to an externally supplied metric
/// such as prediction MSE; it is copied onto the outcome of the winner.
pub fn rank_instruments(
    results: &[BacktestResult],
    auxiliary: &HashMap<SampleKey, f64>,
) -> BTreeMap<String, RankingOutcome> {
    let mut by_instrument: BTreeMap<&str, Vec<&BacktestResult>> = BTreeMap::new();
    for r in results {
        by_instrument.entry(r.instrument.as_str()).or_default().push(r);
    }

    let mut outcomes = BTreeMap::new();
    for (instrument, candidates) in by_instrument {
        let Ok(best) = select_best(candidates.iter().copied()) else {
            continue;
        };
        outcomes.insert(
            instrument.to_string(),
            RankingOutcome {
                instrument: instrument.to_string(),
                best: best.clone(),
                candidate_count: candidates.len(),
                verdict_95: CalibrationVerdict::classify(
                    best.viol_rate_95(),
                    ConfidenceLevel::P95.alpha(),
                ),
                auxiliary: auxiliary.get(&best.key()).copied(),
            },
        );
    }
    outcomes
}

fn ascending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
