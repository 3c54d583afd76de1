//! Cohort aggregation: summary statistics per named group of instruments.
//!
//! Membership is injected as `group → [instrument]` lists, plus an optional
//! default group that collects every unlisted instrument. Degenerate Kupiec
//! p-values (`0`, `±inf`, NaN) are dropped before averaging; violation rates
//! are dropped only when non-finite.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::BacktestResult;
use crate::error::BacktestError;

/// A p-value above this counts as "Kupiec OK" (coverage not rejected at 5%).
pub const KUPIEC_OK_LEVEL: f64 = 0.05;

/// Instrument → group assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortMembership {
    groups: BTreeMap<String, Vec<String>>,
    default_group: Option<String>,
    index: HashMap<String, String>,
}

impl CohortMembership {
    /// Build a membership from group lists. An instrument may appear in at
    /// most one group.
    pub fn new(
        groups: BTreeMap<String, Vec<String>>,
        default_group: Option<String>,
    ) -> Result<Self, BacktestError> {
        let mut index: HashMap<String, String> = HashMap::new();
        for (group, instruments) in &groups {
            for instrument in instruments {
                if let Some(first) = index.get(instrument) {
                    if first != group {
                        return Err(BacktestError::DuplicateMembership {
                            instrument: instrument.clone(),
                            first: first.clone(),
                            second: group.clone(),
                        });
                    }
                    continue;
                }
                index.insert(instrument.clone(), group.clone());
            }
        }
        Ok(Self {
            groups,
            default_group,
            index,
        })
    }

    /// Group of an instrument, falling back to the default group.
    pub fn group_of(&self, instrument: &str) -> Option<&str> {
        self.index
            .get(instrument)
            .map(String::as_str)
            .or(self.default_group.as_deref())
    }

    /// Configured group names, including the default group.
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: BTreeSet<&str> = self.groups.keys().map(String::as_str).collect();
        if let Some(default) = &self.default_group {
            names.insert(default.as_str());
        }
        names.into_iter().collect()
    }

    pub fn default_group(&self) -> Option<&str> {
        self.default_group.as_deref()
    }

    /// Every explicitly listed instrument.
    pub fn listed_instruments(&self) -> Vec<&str> {
        self.groups
            .values()
            .flat_map(|v| v.iter().map(String::as_str))
            .collect()
    }
}

/// Averages over one cohort. A statistic is `None` when none of its values
/// were valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub instrument_count: usize,
    pub row_count: usize,
    pub avg_viol_rate_95: Option<f64>,
    pub avg_viol_rate_99: Option<f64>,
    pub avg_kupiec_p95: Option<f64>,
    /// Share of valid p95 values above `KUPIEC_OK_LEVEL`, in [0, 1].
    pub pct_kupiec95_ok: Option<f64>,
}

/// Summarise `results` per group. Every configured group is present in the
/// output; groups without any valid statistic map to `None`.
pub fn aggregate(
    results: &[BacktestResult],
    membership: &CohortMembership,
) -> BTreeMap<String, Option<CohortSummary>> {
    let mut members: BTreeMap<&str, Vec<&BacktestResult>> = membership
        .group_names()
        .into_iter()
        .map(|g| (g, Vec::new()))
        .collect();
    for r in results {
        if let Some(group) = membership.group_of(&r.instrument) {
            members.entry(group).or_default().push(r);
        }
    }

    members
        .into_iter()
        .map(|(group, rows)| (group.to_string(), summarise(&rows)))
        .collect()
}

/// Instruments in `results` that no group claims.
pub fn unassigned_instruments<'a>(
    results: &'a [BacktestResult],
    membership: &CohortMembership,
) -> BTreeSet<&'a str> {
    results
        .iter()
        .filter(|r| membership.group_of(&r.instrument).is_none())
        .map(|r| r.instrument.as_str())
        .collect()
}

fn summarise(rows: &[&BacktestResult]) -> Option<CohortSummary> {
    if rows.is_empty() {
        return None;
    }

    let rate_95: Vec<f64> = rows
        .iter()
        .map(|r| r.viol_rate_95())
        .filter(|v| v.is_finite())
        .collect();
    let rate_99: Vec<f64> = rows
        .iter()
        .map(|r| r.viol_rate_99())
        .filter(|v| v.is_finite())
        .collect();
    let p95: Vec<f64> = rows
        .iter()
        .map(|r| r.kupiec_p95())
        .filter(|p| is_valid_p_value(*p))
        .collect();

    if rate_95.is_empty() && rate_99.is_empty() && p95.is_empty() {
        return None;
    }

    let instruments: BTreeSet<&str> = rows.iter().map(|r| r.instrument.as_str()).collect();
    let pct_ok = if p95.is_empty() {
        None
    } else {
        let ok = p95.iter().filter(|p| **p > KUPIEC_OK_LEVEL).count();
        Some(ok as f64 / p95.len() as f64)
    };

    Some(CohortSummary {
        instrument_count: instruments.len(),
        row_count: rows.len(),
        avg_viol_rate_95: mean(&rate_95),
        avg_viol_rate_99: mean(&rate_99),
        avg_kupiec_p95: mean(&p95),
        pct_kupiec95_ok: pct_ok,
    })
}

/// `0` and non-finite values mark degenerate Kupiec outcomes.
fn is_valid_p_value(p: f64) -> bool {
    p.is_finite() && p != 0.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
