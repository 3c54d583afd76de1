//! Sample loading from a directory of prediction files.
//!
//! Layout:
//! - `<instrument>_<model>.csv` with header `actual,predicted`
//! - `<instrument>_<model>_<metric>.txt`, free text whose first decimal
//!   literal is an auxiliary metric (e.g. prediction MSE)
//!
//! Instrument and model are split at the first `_`, so model names may
//! themselves contain underscores. A file that fails to parse is reported
//! as a `FailedSample` and does not stop the others from loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use varlab_core::{Sample, SampleKey};

use crate::batch::FailedSample;
use crate::export::{FAILURES_FILE, SUMMARY_FILE};

/// Errors from the loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed sample file '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Samples read from a directory, plus the files that could not be read.
#[derive(Debug, Default)]
pub struct LoadedSamples {
    /// Sorted by (instrument, model).
    pub samples: Vec<Sample>,
    pub failures: Vec<FailedSample>,
}

#[derive(Debug, Deserialize)]
struct SampleRecord {
    actual: f64,
    predicted: f64,
}

/// Split a file stem into (instrument, model) at the first `_`.
pub fn split_stem(stem: &str) -> Option<(&str, &str)> {
    let (instrument, model) = stem.split_once('_')?;
    if instrument.is_empty() || model.is_empty() {
        return None;
    }
    Some((instrument, model))
}

/// Load every `<instrument>_<model>.csv` in `dir`.
///
/// Only directory-level I/O errors are returned as `Err`; per-file problems
/// land in `LoadedSamples::failures`.
pub fn load_samples(dir: &Path) -> Result<LoadedSamples, LoadError> {
    let mut loaded = LoadedSamples::default();

    for path in list_files(dir, "csv")? {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        if file_name == SUMMARY_FILE || file_name == FAILURES_FILE {
            continue;
        }
        let Some((instrument, model)) = split_stem(stem) else {
            warn!(file = %path.display(), "skipping file without instrument_model name");
            continue;
        };

        match read_sample_csv(&path, instrument, model) {
            Ok(sample) => {
                debug!(file = %path.display(), n = sample.len(), "loaded sample");
                loaded.samples.push(sample);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to load sample");
                loaded.failures.push(FailedSample {
                    instrument: instrument.to_string(),
                    model: model.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    loaded
        .samples
        .sort_by(|a, b| (&a.instrument, &a.model).cmp(&(&b.instrument, &b.model)));
    Ok(loaded)
}

/// Read one `actual,predicted` CSV file.
pub fn read_sample_csv(path: &Path, instrument: &str, model: &str) -> Result<Sample, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut actual = Vec::new();
    let mut predicted = Vec::new();
    for record in reader.deserialize::<SampleRecord>() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        actual.push(record.actual);
        predicted.push(record.predicted);
    }
    Ok(Sample::new(instrument, model, actual, predicted))
}

/// Load `<instrument>_<model>_<metric>.txt` files from `dir`.
///
/// Files that cannot be read or hold no finite number are skipped.
pub fn load_auxiliary(dir: &Path, metric: &str) -> Result<HashMap<SampleKey, f64>, LoadError> {
    let suffix = format!("_{metric}");
    let mut values = HashMap::new();

    for path in list_files(dir, "txt")? {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(key_stem) = stem.strip_suffix(&suffix) else {
            continue;
        };
        let Some((instrument, model)) = split_stem(key_stem) else {
            continue;
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "unreadable metric file; skipped");
                continue;
            }
        };
        match parse_metric_text(&text) {
            Some(v) => {
                values.insert(SampleKey::new(instrument, model), v);
            }
            None => debug!(file = %path.display(), "no numeric value in metric file"),
        }
    }
    Ok(values)
}

static NUMBER_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// First decimal literal anywhere in `text`, if it is finite.
///
/// Words such as `nan` or `inf` are not numbers here.
pub fn parse_metric_text(text: &str) -> Option<f64> {
    let re = NUMBER_RE
        .get_or_init(|| Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").ok())
        .as_ref()?;
    re.find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Files in `dir` with the given extension, in name order.
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_splits_at_first_underscore() {
        assert_eq!(split_stem("Apple_LSTM"), Some(("Apple", "LSTM")));
        assert_eq!(split_stem("Apple_CNN_1D"), Some(("Apple", "CNN_1D")));
        assert_eq!(split_stem("Apple"), None);
        assert_eq!(split_stem("_LSTM"), None);
        assert_eq!(split_stem("Apple_"), None);
    }

    #[test]
    fn metric_text_takes_first_number() {
        assert_eq!(parse_metric_text("0.00042"), Some(0.00042));
        assert_eq!(parse_metric_text("MSE: 1.5e-4\n"), Some(1.5e-4));
        assert_eq!(parse_metric_text("mse = 3, rmse = 1.7"), Some(3.0));
        assert_eq!(parse_metric_text("not available"), None);
        assert_eq!(parse_metric_text(""), None);
    }

    #[test]
    fn metric_text_finds_numbers_attached_to_labels() {
        assert_eq!(parse_metric_text("MSE:0.5"), Some(0.5));
        assert_eq!(parse_metric_text("mse=0.5"), Some(0.5));
        assert_eq!(parse_metric_text("loss(.25)"), Some(0.25));
        assert_eq!(parse_metric_text("-3E2 units"), Some(-300.0));
    }

    #[test]
    fn metric_text_rejects_non_finite_values() {
        assert_eq!(parse_metric_text("MSE: nan"), None);
        assert_eq!(parse_metric_text("MSE: inf"), None);
        assert_eq!(parse_metric_text("MSE: -infinity"), None);
        assert_eq!(parse_metric_text("MSE: 1e999"), None);
    }

    #[test]
    fn loads_directory_and_isolates_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Tesla_MLP.csv"),
            "actual,predicted\n0.01,0.02\n-0.03,-0.01\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Apple_CNN_1D.csv"),
            "actual, predicted\n0.5, 0.4\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("Apple_LSTM.csv"), "actual,predicted\nx,1\n").unwrap();
        std::fs::write(dir.path().join("README.csv"), "nothing\n").unwrap();
        std::fs::write(dir.path().join(SUMMARY_FILE), "instrument,model\n").unwrap();

        let loaded = load_samples(dir.path()).unwrap();
        let keys: Vec<String> = loaded.samples.iter().map(|s| s.key().to_string()).collect();
        assert_eq!(keys, vec!["Apple/CNN_1D", "Tesla/MLP"]);
        assert_eq!(loaded.samples[1].actual, vec![0.01, -0.03]);
        assert_eq!(loaded.samples[1].predicted, vec![0.02, -0.01]);

        assert_eq!(loaded.failures.len(), 1);
        assert_eq!(loaded.failures[0].instrument, "Apple");
        assert_eq!(loaded.failures[0].model, "LSTM");
    }

    #[test]
    fn loads_auxiliary_metric_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Apple_LSTM_mse.txt"), "0.0012\n").unwrap();
        std::fs::write(dir.path().join("Apple_MLP_mse.txt"), "n/a\n").unwrap();
        std::fs::write(dir.path().join("Apple_MLP_mae.txt"), "0.5\n").unwrap();

        let aux = load_auxiliary(dir.path(), "mse").unwrap();
        assert_eq!(aux.len(), 1);
        assert_eq!(aux[&SampleKey::new("Apple", "LSTM")], 0.0012);
    }

    #[test]
    fn unreadable_metric_file_does_not_drop_others() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Apple_LSTM_mse.txt"), "MSE: 0.001").unwrap();
        std::fs::write(dir.path().join("Tesla_LSTM_mse.txt"), [0xff, 0xfe, 0x00, 0x31]).unwrap();

        let aux = load_auxiliary(dir.path(), "mse").unwrap();
        assert_eq!(aux.len(), 1);
        assert_eq!(aux[&SampleKey::new("Apple", "LSTM")], 0.001);
    }

    #[test]
    fn missing_directory_is_error() {
        assert!(matches!(
            load_samples(Path::new("/nonexistent/varlab")),
            Err(LoadError::Io { .. })
        ));
    }
}
