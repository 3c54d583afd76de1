//! TOML configuration for batch backtests.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [backtest]
//! input_dir = "results"
//! output_dir = "results"
//! boundary_policy = "literal"
//! threads = 0
//! auxiliary_metric = "mse"
//!
//! [cohorts]
//! default = "US"
//! [cohorts.groups]
//! India = ["Reliance", "Infosys"]
//! US = ["Apple", "Tesla"]
//!
//! [synthetic]
//! models = ["MLP", "LSTM"]
//! observations = 250
//! seed = 42
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use varlab_core::{BacktestError, BoundaryPolicyKind, CohortMembership};

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid cohorts: {0}")]
    Cohorts(#[from] BacktestError),
    #[error("cohort group names must not be empty")]
    EmptyGroupName,
    #[error("auxiliary metric name must not be empty")]
    EmptyMetricName,
    #[error("synthetic samples need at least 2 observations, got {0}")]
    TooFewObservations(usize),
}

/// Complete configuration of a `varlab run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub cohorts: CohortConfig,
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    /// Directory holding `<instrument>_<model>.csv` sample files.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub boundary_policy: BoundaryPolicyKind,
    /// Worker threads; 0 uses the global rayon pool.
    pub threads: usize,
    /// Name of the auxiliary metric files (`<instrument>_<model>_<metric>.txt`).
    pub auxiliary_metric: String,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("results"),
            output_dir: PathBuf::from("results"),
            boundary_policy: BoundaryPolicyKind::default(),
            threads: 0,
            auxiliary_metric: "mse".into(),
        }
    }
}

/// Group → instrument lists, plus an optional catch-all group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub default: Option<String>,
    pub groups: BTreeMap<String, Vec<String>>,
}

impl CohortConfig {
    pub fn membership(&self) -> Result<CohortMembership, BacktestError> {
        CohortMembership::new(self.groups.clone(), self.default.clone())
    }

    /// All listed instruments, sorted and deduplicated.
    pub fn instruments(&self) -> Vec<String> {
        let mut all: Vec<String> = self.groups.values().flatten().cloned().collect();
        all.sort();
        all.dedup();
        all
    }
}

/// Parameters for generated samples (`varlab run --synthetic`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub models: Vec<String>,
    pub observations: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            models: ["MLP", "LSTM", "CNN1D", "Transformer"]
                .into_iter()
                .map(String::from)
                .collect(),
            observations: 250,
            seed: 42,
        }
    }
}

impl BacktestConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let blank_group = self.cohorts.groups.keys().any(|g| g.trim().is_empty())
            || self
                .cohorts
                .default
                .as_ref()
                .is_some_and(|g| g.trim().is_empty());
        if blank_group {
            return Err(ConfigError::EmptyGroupName);
        }
        self.cohorts.membership()?;

        if self.backtest.auxiliary_metric.trim().is_empty() {
            return Err(ConfigError::EmptyMetricName);
        }
        if self.synthetic.observations < 2 {
            return Err(ConfigError::TooFewObservations(self.synthetic.observations));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = BacktestConfig::from_toml("").unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert_eq!(config.backtest.input_dir, PathBuf::from("results"));
        assert_eq!(config.backtest.boundary_policy, BoundaryPolicyKind::Literal);
        assert_eq!(config.backtest.auxiliary_metric, "mse");
    }

    #[test]
    fn parses_full_file() {
        let config = BacktestConfig::from_toml(
            r#"
            [backtest]
            input_dir = "data/preds"
            boundary_policy = "textbook"
            threads = 4

            [cohorts]
            default = "US"
            [cohorts.groups]
            India = ["Reliance", "Infosys"]
            US = ["Apple"]

            [synthetic]
            models = ["LSTM"]
            observations = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.backtest.input_dir, PathBuf::from("data/preds"));
        assert_eq!(config.backtest.output_dir, PathBuf::from("results"));
        assert_eq!(config.backtest.boundary_policy, BoundaryPolicyKind::Textbook);
        assert_eq!(config.backtest.threads, 4);
        assert_eq!(config.cohorts.default.as_deref(), Some("US"));
        assert_eq!(
            config.cohorts.instruments(),
            vec!["Apple", "Infosys", "Reliance"]
        );
        assert_eq!(config.synthetic.models, vec!["LSTM"]);
        assert_eq!(config.synthetic.seed, 42);

        let membership = config.cohorts.membership().unwrap();
        assert_eq!(membership.group_of("Tesla"), Some("US"));
        assert_eq!(membership.group_of("Infosys"), Some("India"));
    }

    #[test]
    fn duplicate_instrument_rejected() {
        let err = BacktestConfig::from_toml(
            r#"
            [cohorts.groups]
            India = ["Apple"]
            US = ["Apple"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Cohorts(_)));
    }

    #[test]
    fn unknown_policy_rejected() {
        let err = BacktestConfig::from_toml("[backtest]\nboundary_policy = \"strict\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn blank_group_rejected() {
        let err = BacktestConfig::from_toml("[cohorts]\ndefault = \" \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyGroupName));
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = BacktestConfig::default();
        config
            .cohorts
            .groups
            .insert("US".into(), vec!["Apple".into(), "Tesla".into()]);
        let text = config.to_toml().unwrap();
        assert_eq!(BacktestConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = BacktestConfig::from_file(Path::new("/nonexistent/varlab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
