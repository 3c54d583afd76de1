//! Result table: one row per (instrument, model), in flat export form.
//!
//! Column names follow the published summary layout:
//! `instrument, model, n, VaR95, VaR99, ViolRate95, ViolRate99, Kupiec_LR95,
//! Kupiec_p95, Kupiec_LR99, Kupiec_p99, Violations95, Violations99`.
//! Degenerate Kupiec outcomes are written with their legacy numeric encoding
//! and recovered as tagged outcomes on import.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use varlab_core::{BacktestResult, KupiecOutcome, ThresholdSet, ViolationCount};

/// Flat row as exported to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub instrument: String,
    pub model: String,
    pub n: usize,
    #[serde(rename = "VaR95")]
    pub var_95: f64,
    #[serde(rename = "VaR99")]
    pub var_99: f64,
    #[serde(rename = "ViolRate95")]
    pub viol_rate_95: f64,
    #[serde(rename = "ViolRate99")]
    pub viol_rate_99: f64,
    #[serde(rename = "Kupiec_LR95")]
    pub kupiec_lr_95: f64,
    #[serde(rename = "Kupiec_p95")]
    pub kupiec_p95: f64,
    #[serde(rename = "Kupiec_LR99")]
    pub kupiec_lr_99: f64,
    #[serde(rename = "Kupiec_p99")]
    pub kupiec_p99: f64,
    #[serde(rename = "Violations95")]
    pub violations_95: usize,
    #[serde(rename = "Violations99")]
    pub violations_99: usize,
}

impl From<&BacktestResult> for ResultRow {
    fn from(r: &BacktestResult) -> Self {
        Self {
            instrument: r.instrument.clone(),
            model: r.model.clone(),
            n: r.n(),
            var_95: r.var_95(),
            var_99: r.var_99(),
            viol_rate_95: r.viol_rate_95(),
            viol_rate_99: r.viol_rate_99(),
            kupiec_lr_95: r.kupiec_lr_95(),
            kupiec_p95: r.kupiec_p95(),
            kupiec_lr_99: r.kupiec_lr_99(),
            kupiec_p99: r.kupiec_p99(),
            violations_95: r.violations_95.violations,
            violations_99: r.violations_99.violations,
        }
    }
}

impl From<ResultRow> for BacktestResult {
    fn from(row: ResultRow) -> Self {
        Self {
            instrument: row.instrument,
            model: row.model,
            thresholds: ThresholdSet {
                var_95: row.var_95,
                var_99: row.var_99,
            },
            violations_95: ViolationCount {
                violations: row.violations_95,
                n: row.n,
                rate: row.viol_rate_95,
            },
            violations_99: ViolationCount {
                violations: row.violations_99,
                n: row.n,
                rate: row.viol_rate_99,
            },
            kupiec_95: KupiecOutcome::from_encoded(row.kupiec_lr_95, row.kupiec_p95),
            kupiec_99: KupiecOutcome::from_encoded(row.kupiec_lr_99, row.kupiec_p99),
        }
    }
}

/// Completed backtests, sorted by (instrument, model).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    results: Vec<BacktestResult>,
}

impl ResultTable {
    pub fn new(mut results: Vec<BacktestResult>) -> Self {
        results.sort_by(|a, b| (&a.instrument, &a.model).cmp(&(&b.instrument, &b.model)));
        Self { results }
    }

    /// Rebuild a table from imported rows.
    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        Self::new(rows.into_iter().map(BacktestResult::from).collect())
    }

    pub fn results(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn rows(&self) -> Vec<ResultRow> {
        self.results.iter().map(ResultRow::from).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Distinct instrument names, sorted.
    pub fn instruments(&self) -> Vec<&str> {
        self.results
            .iter()
            .map(|r| r.instrument.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn for_instrument<'a>(
        &'a self,
        instrument: &'a str,
    ) -> impl Iterator<Item = &'a BacktestResult> + 'a {
        self.results.iter().filter(move |r| r.instrument == instrument)
    }
}
