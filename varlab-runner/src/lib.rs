//! VarLab Runner: batch backtests, configuration, loading and export.
//!
//! This crate builds on `varlab-core` to provide:
//! - TOML configuration (paths, boundary policy, cohorts)
//! - Sample and auxiliary-metric loading from a results directory
//! - Parallel batch execution with per-sample failure isolation
//! - Result tables with CSV/JSON export and import
//! - Deterministic synthetic samples

pub mod batch;
pub mod config;
pub mod export;
pub mod sample_loader;
pub mod synthetic;
pub mod table;

pub use batch::{dataset_hash, run_batch, run_loaded, BatchOptions, BatchOutcome, FailedSample, RunError};
pub use config::{BacktestConfig, CohortConfig, ConfigError, SyntheticConfig};
pub use export::{RunManifest, SCHEMA_VERSION};
pub use sample_loader::{load_auxiliary, load_samples, LoadError, LoadedSamples};
pub use synthetic::{generate_sample, generate_samples};
pub use table::{ResultRow, ResultTable};
