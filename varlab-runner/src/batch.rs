//! Batch runner: backtests many samples in parallel.
//!
//! Samples are independent, so they run on a rayon pool with no shared
//! mutable state. Results are collected in input order and then folded into
//! successes and failures: one bad sample is recorded and skipped, never
//! fatal to the batch.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use varlab_core::{BacktestError, BacktestResult, BacktestRunner, BoundaryPolicyKind, Sample};

use crate::sample_loader::LoadedSamples;
use crate::table::ResultTable;

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A sample that could not be loaded or backtested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSample {
    pub instrument: String,
    pub model: String,
    pub error: String,
}

impl FailedSample {
    fn from_backtest(sample: &Sample, error: &BacktestError) -> Self {
        Self {
            instrument: sample.instrument.clone(),
            model: sample.model.clone(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub policy: BoundaryPolicyKind,
    /// Worker threads; 0 runs on the global rayon pool.
    pub threads: usize,
}

/// Everything a batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub table: ResultTable,
    pub failures: Vec<FailedSample>,
    /// BLAKE3 fingerprint of the input samples.
    pub dataset_hash: String,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.table.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Backtest every sample. Only pool construction can fail.
pub fn run_batch(samples: &[Sample], opts: &BatchOptions) -> Result<BatchOutcome, RunError> {
    let runner = BacktestRunner::from_kind(opts.policy);
    info!(
        samples = samples.len(),
        threads = opts.threads,
        policy = %opts.policy,
        "starting batch"
    );

    let evaluate = || -> Vec<Result<BacktestResult, BacktestError>> {
        samples.par_iter().map(|s| runner.run(s)).collect()
    };
    let outcomes = if opts.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(opts.threads)
            .build()?
            .install(evaluate)
    } else {
        evaluate()
    };

    let (results, failures) = samples.iter().zip(outcomes).fold(
        (Vec::with_capacity(samples.len()), Vec::new()),
        |(mut ok, mut failed), (sample, outcome)| {
            match outcome {
                Ok(result) => ok.push(result),
                Err(e) => {
                    warn!(sample = %sample.key(), error = %e, "backtest failed");
                    failed.push(FailedSample::from_backtest(sample, &e));
                }
            }
            (ok, failed)
        },
    );

    let outcome = BatchOutcome {
        table: ResultTable::new(results),
        failures,
        dataset_hash: dataset_hash(samples),
    };
    info!(
        succeeded = outcome.success_count(),
        failed = outcome.failure_count(),
        "batch complete"
    );
    Ok(outcome)
}

/// Backtest loaded samples, carrying loader failures into the outcome.
pub fn run_loaded(loaded: LoadedSamples, opts: &BatchOptions) -> Result<BatchOutcome, RunError> {
    let mut outcome = run_batch(&loaded.samples, opts)?;
    let mut failures = loaded.failures;
    failures.append(&mut outcome.failures);
    failures.sort_by(|a, b| (&a.instrument, &a.model).cmp(&(&b.instrument, &b.model)));
    outcome.failures = failures;
    Ok(outcome)
}

/// Deterministic BLAKE3 hash over all sample values, in (instrument, model)
/// order so that input order does not matter.
pub fn dataset_hash(samples: &[Sample]) -> String {
    let mut ordered: Vec<&Sample> = samples.iter().collect();
    ordered.sort_by(|a, b| (&a.instrument, &a.model).cmp(&(&b.instrument, &b.model)));

    let mut hasher = blake3::Hasher::new();
    for sample in ordered {
        hasher.update(sample.instrument.as_bytes());
        hasher.update(&[0]);
        hasher.update(sample.model.as_bytes());
        hasher.update(&[0]);
        hasher.update(&(sample.actual.len() as u64).to_le_bytes());
        for v in &sample.actual {
            hasher.update(&v.to_le_bytes());
        }
        hasher.update(&(sample.predicted.len() as u64).to_le_bytes());
        for v in &sample.predicted {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(instrument: &str, model: &str, k: usize) -> Sample {
        let predicted: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let actual: Vec<f64> = (0..100).map(|i| if i < k { -1.0 } else { 1.0 }).collect();
        Sample::new(instrument, model, actual, predicted)
    }

    #[test]
    fn bad_sample_does_not_abort_batch() {
        let samples = vec![
            sample("Apple", "LSTM", 5),
            Sample::new("Apple", "MLP", vec![1.0], vec![1.0, 2.0]),
            sample("Tesla", "LSTM", 3),
            Sample::new("Tesla", "MLP", vec![], vec![]),
        ];
        let out = run_batch(&samples, &BatchOptions::default()).unwrap();
        assert_eq!(out.success_count(), 2);
        assert_eq!(out.failure_count(), 2);
        assert_eq!(out.failures[0].model, "MLP");
        assert!(out.failures[0].error.contains("length mismatch"));
        assert_eq!(out.failures[1].error, "sample is empty");
    }

    #[test]
    fn thread_count_does_not_change_results() {
        let samples: Vec<Sample> = (0..20)
            .map(|i| sample(&format!("I{i:02}"), "LSTM", i % 9))
            .collect();
        let serial = run_batch(
            &samples,
            &BatchOptions {
                threads: 1,
                ..Default::default()
            },
        )
        .unwrap();
        let parallel = run_batch(
            &samples,
            &BatchOptions {
                threads: 4,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(serial.table, parallel.table);
        assert_eq!(serial.dataset_hash, parallel.dataset_hash);
    }

    #[test]
    fn policy_is_applied() {
        let samples = vec![sample("Apple", "LSTM", 0)];
        let literal = run_batch(&samples, &BatchOptions::default()).unwrap();
        let textbook = run_batch(
            &samples,
            &BatchOptions {
                policy: BoundaryPolicyKind::Textbook,
                threads: 0,
            },
        )
        .unwrap();
        assert_eq!(literal.table.results()[0].kupiec_p95(), 0.0);
        assert!(textbook.table.results()[0].kupiec_lr_95() > 0.0);
    }

    #[test]
    fn loader_failures_are_merged() {
        let loaded = LoadedSamples {
            samples: vec![sample("Apple", "LSTM", 5)],
            failures: vec![FailedSample {
                instrument: "Apple".into(),
                model: "CNN1D".into(),
                error: "malformed".into(),
            }],
        };
        let out = run_loaded(loaded, &BatchOptions::default()).unwrap();
        assert_eq!(out.success_count(), 1);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].model, "CNN1D");
    }

    #[test]
    fn dataset_hash_ignores_order_but_not_values() {
        let a = vec![sample("Apple", "LSTM", 1), sample("Tesla", "LSTM", 2)];
        let b = vec![sample("Tesla", "LSTM", 2), sample("Apple", "LSTM", 1)];
        let c = vec![sample("Apple", "LSTM", 1), sample("Tesla", "LSTM", 3)];
        assert_eq!(dataset_hash(&a), dataset_hash(&b));
        assert_ne!(dataset_hash(&a), dataset_hash(&c));
        assert_eq!(dataset_hash(&a).len(), 64);
    }
}
