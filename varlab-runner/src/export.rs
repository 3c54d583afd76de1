//! Export: CSV result tables and JSON reports.
//!
//! A run directory holds:
//! - `var_summary.csv`: one row per (instrument, model)
//! - `failures.csv`: samples that could not be backtested (only if any)
//! - `manifest.json`: run provenance
//!
//! Downstream stages add `rankings.json` and `cohorts.json` next to the
//! summary. All JSON artifacts carry a `schema_version`; newer versions are
//! rejected on load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use varlab_core::{BoundaryPolicyKind, CohortSummary, RankingOutcome};

use crate::batch::{BatchOutcome, FailedSample};
use crate::table::{ResultRow, ResultTable};

/// Current schema version for persisted JSON artifacts.
pub const SCHEMA_VERSION: u32 = 1;

pub const SUMMARY_FILE: &str = "var_summary.csv";
pub const FAILURES_FILE: &str = "failures.csv";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const RANKINGS_FILE: &str = "rankings.json";
pub const COHORTS_FILE: &str = "cohorts.json";

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

// ─── Manifest ───────────────────────────────────────────────────────

/// Provenance of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub dataset_hash: String,
    pub boundary_policy: BoundaryPolicyKind,
    pub threads: usize,
    pub synthetic: bool,
    pub sample_count: usize,
    pub failure_count: usize,
}

impl RunManifest {
    pub fn for_outcome(
        outcome: &BatchOutcome,
        boundary_policy: BoundaryPolicyKind,
        threads: usize,
        synthetic: bool,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            dataset_hash: outcome.dataset_hash.clone(),
            boundary_policy,
            threads,
            synthetic,
            sample_count: outcome.success_count(),
            failure_count: outcome.failure_count(),
        }
    }
}

pub fn export_manifest_json(manifest: &RunManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")
}

/// Parse a manifest, rejecting unknown schema versions.
pub fn import_manifest_json(json: &str) -> Result<RunManifest> {
    let manifest: RunManifest =
        serde_json::from_str(json).context("failed to deserialize run manifest")?;
    check_schema(manifest.schema_version)?;
    Ok(manifest)
}

fn check_schema(version: u32) -> Result<()> {
    if version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            version,
            SCHEMA_VERSION
        );
    }
    Ok(())
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Serialize the result table with its published column names.
pub fn export_summary_csv(table: &ResultTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in table.rows() {
        wtr.serialize(row).context("failed to write summary row")?;
    }
    finish_csv(wtr)
}

/// Parse a summary CSV back into a result table.
pub fn import_summary_csv(text: &str) -> Result<ResultTable> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let rows = rdr
        .deserialize::<ResultRow>()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("malformed summary row {}", i + 1)))
        .collect::<Result<Vec<_>>>()?;
    Ok(ResultTable::from_rows(rows))
}

pub fn read_summary(path: &Path) -> Result<ResultTable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_summary_csv(&text).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn export_failures_csv(failures: &[FailedSample]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for f in failures {
        wtr.serialize(f).context("failed to write failure row")?;
    }
    finish_csv(wtr)
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Reports ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub auxiliary_metric: Option<String>,
    pub rankings: BTreeMap<String, RankingOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Groups with no valid data map to `null`.
    pub cohorts: BTreeMap<String, Option<CohortSummary>>,
}

pub fn export_rankings_json(
    rankings: &BTreeMap<String, RankingOutcome>,
    auxiliary_metric: Option<&str>,
) -> Result<String> {
    let report = RankingReport {
        schema_version: SCHEMA_VERSION,
        auxiliary_metric: auxiliary_metric.map(String::from),
        rankings: rankings.clone(),
    };
    serde_json::to_string_pretty(&report).context("failed to serialize rankings")
}

pub fn export_cohorts_json(cohorts: &BTreeMap<String, Option<CohortSummary>>) -> Result<String> {
    let report = CohortReport {
        schema_version: SCHEMA_VERSION,
        cohorts: cohorts.clone(),
    };
    serde_json::to_string_pretty(&report).context("failed to serialize cohort summaries")
}

/// Parse a cohort report, rejecting unknown schema versions.
pub fn import_cohorts_json(json: &str) -> Result<CohortReport> {
    let report: CohortReport =
        serde_json::from_str(json).context("failed to deserialize cohort report")?;
    check_schema(report.schema_version)?;
    Ok(report)
}

// ─── Run directory ──────────────────────────────────────────────────

/// Write the summary, failures and manifest of a batch into `output_dir`.
///
/// Returns the path of the written summary.
pub fn save_run(outcome: &BatchOutcome, manifest: &RunManifest, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let summary_path = output_dir.join(SUMMARY_FILE);
    write_file(&summary_path, &export_summary_csv(&outcome.table)?)?;

    let failures_path = output_dir.join(FAILURES_FILE);
    if outcome.failures.is_empty() {
        if failures_path.exists() {
            std::fs::remove_file(&failures_path).with_context(|| {
                format!("failed to remove stale {}", failures_path.display())
            })?;
        }
    } else {
        write_file(&failures_path, &export_failures_csv(&outcome.failures)?)?;
    }

    write_file(&output_dir.join(MANIFEST_FILE), &export_manifest_json(manifest)?)?;
    Ok(summary_path)
}

/// Load the manifest of a run directory.
pub fn load_manifest(dir: &Path) -> Result<RunManifest> {
    let path = dir.join(MANIFEST_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_manifest_json(&json)
}

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{run_batch, BatchOptions};
    use varlab_core::Sample;

    fn outcome() -> BatchOutcome {
        let predicted: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let calibrated: Vec<f64> = (0..200).map(|i| if i < 10 { -1.0 } else { 500.0 }).collect();
        let clean = vec![500.0; 200];
        let samples = vec![
            Sample::new("Apple", "LSTM", calibrated, predicted.clone()),
            Sample::new("Apple", "MLP", clean, predicted),
            Sample::new("Tesla", "MLP", vec![], vec![]),
        ];
        run_batch(&samples, &BatchOptions::default()).unwrap()
    }

    #[test]
    fn summary_csv_has_published_columns() {
        let csv = export_summary_csv(&outcome().table).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "instrument,model,n,VaR95,VaR99,ViolRate95,ViolRate99,Kupiec_LR95,Kupiec_p95,\
             Kupiec_LR99,Kupiec_p99,Violations95,Violations99"
        );
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn summary_csv_roundtrip() {
        let table = outcome().table;
        let restored = import_summary_csv(&export_summary_csv(&table).unwrap()).unwrap();
        assert_eq!(restored, table);
    }

    #[test]
    fn non_finite_values_roundtrip_through_csv() {
        let mut table = outcome().table;
        let mut results = table.results().to_vec();
        results[0].kupiec_99 = varlab_core::KupiecOutcome::NonFinite {
            lr: f64::NEG_INFINITY,
        };
        table = ResultTable::new(results);
        let csv = export_summary_csv(&table).unwrap();
        assert!(csv.contains("-inf"));
        let restored = import_summary_csv(&csv).unwrap();
        assert_eq!(restored.results()[0].kupiec_lr_99(), f64::NEG_INFINITY);
        assert_eq!(restored.results()[0].kupiec_p99(), 0.0);
    }

    #[test]
    fn malformed_summary_is_error() {
        let err = import_summary_csv("instrument,model\nApple,LSTM\n").unwrap_err();
        assert!(err.to_string().contains("malformed summary row 1"));
    }

    #[test]
    fn failures_csv_lists_failed_samples() {
        let csv = export_failures_csv(&outcome().failures).unwrap();
        assert_eq!(csv, "instrument,model,error\nTesla,MLP,sample is empty\n");
    }

    #[test]
    fn manifest_rejects_newer_schema() {
        let o = outcome();
        let mut manifest = RunManifest::for_outcome(&o, BoundaryPolicyKind::Literal, 0, false);
        let json = export_manifest_json(&manifest).unwrap();
        assert_eq!(import_manifest_json(&json).unwrap(), manifest);

        manifest.schema_version = SCHEMA_VERSION + 1;
        let json = export_manifest_json(&manifest).unwrap();
        assert!(import_manifest_json(&json).is_err());
    }

    #[test]
    fn cohort_report_keeps_null_groups() {
        let mut cohorts = BTreeMap::new();
        cohorts.insert("India".to_string(), None);
        let json = export_cohorts_json(&cohorts).unwrap();
        assert!(json.contains("\"India\": null"));
        let report = import_cohorts_json(&json).unwrap();
        assert_eq!(report.cohorts["India"], None);
    }
}
