//! VarLab CLI: batch VaR backtests, model ranking and cohort summaries.
//!
//! Commands:
//! - `run`: backtest every sample in a results directory (or synthetic samples)
//! - `rank`: pick the best model per instrument from a summary CSV
//! - `cohorts`: summarise a summary CSV per configured cohort

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use varlab_core::aggregate::unassigned_instruments;
use varlab_core::{aggregate, rank_instruments, BoundaryPolicyKind, CohortSummary, RankingOutcome};
use varlab_runner::export::{
    export_cohorts_json, export_rankings_json, read_summary, save_run, write_file, COHORTS_FILE,
    RANKINGS_FILE,
};
use varlab_runner::{
    generate_samples, load_auxiliary, load_samples, run_batch, run_loaded, BacktestConfig,
    BatchOptions, BatchOutcome, ResultTable, RunManifest,
};

#[derive(Parser)]
#[command(name = "varlab", about = "VarLab CLI: Value-at-Risk model backtesting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest every (instrument, model) sample and write the result table.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory of `<instrument>_<model>.csv` files (overrides config).
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Output directory (overrides config).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Worker threads; 0 uses all cores (overrides config).
        #[arg(long)]
        threads: Option<usize>,

        /// Kupiec boundary policy: literal or textbook (overrides config).
        #[arg(long)]
        policy: Option<BoundaryPolicyKind>,

        /// Generate synthetic samples for the configured cohort instruments.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for synthetic samples (overrides config).
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Select the best-calibrated model for each instrument.
    Rank {
        /// Summary CSV written by `run`.
        #[arg(long)]
        summary: PathBuf,

        /// Directory of auxiliary metric files. Defaults to the summary's directory.
        #[arg(long)]
        aux_dir: Option<PathBuf>,

        /// Auxiliary metric name (`<instrument>_<model>_<metric>.txt`).
        #[arg(long, default_value = "mse")]
        metric: String,
    },
    /// Summarise results per cohort.
    Cohorts {
        /// Summary CSV written by `run`.
        #[arg(long)]
        summary: PathBuf,

        /// TOML config with a `[cohorts]` section.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input_dir,
            output_dir,
            threads,
            policy,
            synthetic,
            seed,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(dir) = input_dir {
                cfg.backtest.input_dir = dir;
            }
            if let Some(dir) = output_dir {
                cfg.backtest.output_dir = dir;
            }
            if let Some(n) = threads {
                cfg.backtest.threads = n;
            }
            if let Some(p) = policy {
                cfg.backtest.boundary_policy = p;
            }
            if let Some(s) = seed {
                cfg.synthetic.seed = s;
            }
            run_command(&cfg, synthetic)
        }
        Commands::Rank {
            summary,
            aux_dir,
            metric,
        } => rank_command(&summary, aux_dir.as_deref(), &metric),
        Commands::Cohorts { summary, config } => cohorts_command(&summary, &config),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("varlab=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<BacktestConfig> {
    match path {
        Some(p) => BacktestConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(BacktestConfig::default()),
    }
}

// ─── run ────────────────────────────────────────────────────────────

fn run_command(cfg: &BacktestConfig, synthetic: bool) -> Result<()> {
    let opts = BatchOptions {
        policy: cfg.backtest.boundary_policy,
        threads: cfg.backtest.threads,
    };

    let outcome: BatchOutcome = if synthetic {
        let instruments = cfg.cohorts.instruments();
        if instruments.is_empty() {
            bail!("--synthetic needs instruments listed under [cohorts.groups] in the config");
        }
        warn!("generating synthetic samples; results are not real model output");
        let samples = generate_samples(&instruments, &cfg.synthetic);
        run_batch(&samples, &opts)?
    } else {
        let dir = &cfg.backtest.input_dir;
        info!(dir = %dir.display(), "loading samples");
        let loaded = load_samples(dir)
            .with_context(|| format!("failed to load samples from {}", dir.display()))?;
        if loaded.samples.is_empty() && loaded.failures.is_empty() {
            bail!("no <instrument>_<model>.csv files found in {}", dir.display());
        }
        run_loaded(loaded, &opts)?
    };

    let manifest = RunManifest::for_outcome(&outcome, opts.policy, opts.threads, synthetic);
    let summary_path = save_run(&outcome, &manifest, &cfg.backtest.output_dir)?;

    print_table(&outcome.table);
    if !outcome.failures.is_empty() {
        println!();
        println!("--- Failed samples ({}) ---", outcome.failures.len());
        for f in &outcome.failures {
            println!("{}/{}: {}", f.instrument, f.model, f.error);
        }
    }
    println!();
    println!("Dataset hash: {}", outcome.dataset_hash);
    println!("Summary written to {}", summary_path.display());
    if synthetic {
        println!("WARNING: Results based on SYNTHETIC samples");
    }
    Ok(())
}

fn print_table(table: &ResultTable) {
    println!(
        "{:<14} {:<14} {:>6} {:>10} {:>10} {:>8} {:>8} {:>9} {:>9}",
        "Instrument", "Model", "n", "VaR95", "VaR99", "Viol95", "Viol99", "p95", "p99"
    );
    for r in table.results() {
        println!(
            "{:<14} {:<14} {:>6} {:>10.5} {:>10.5} {:>7.2}% {:>7.2}% {:>9} {:>9}",
            r.instrument,
            r.model,
            r.n(),
            r.var_95(),
            r.var_99(),
            r.viol_rate_95() * 100.0,
            r.viol_rate_99() * 100.0,
            format_p(&r.kupiec_95),
            format_p(&r.kupiec_99),
        );
    }
}

fn format_p(outcome: &varlab_core::KupiecOutcome) -> String {
    match outcome.computed_p_value() {
        Some(p) => format!("{p:.4}"),
        None => "—".into(),
    }
}

// ─── rank ───────────────────────────────────────────────────────────

fn rank_command(summary: &Path, aux_dir: Option<&Path>, metric: &str) -> Result<()> {
    let table = read_summary(summary)?;
    let base = summary_dir(summary);
    let aux_dir = aux_dir.unwrap_or(base);
    let auxiliary = load_auxiliary(aux_dir, metric)
        .with_context(|| format!("failed to load {metric} files from {}", aux_dir.display()))?;
    info!(rows = table.len(), auxiliary = auxiliary.len(), "ranking models");

    let rankings = rank_instruments(table.results(), &auxiliary);
    print_rankings(&rankings, metric);

    let path = base.join(RANKINGS_FILE);
    write_file(&path, &export_rankings_json(&rankings, Some(metric))?)?;
    println!();
    println!("Rankings written to {}", path.display());
    Ok(())
}

fn print_rankings(rankings: &BTreeMap<String, RankingOutcome>, metric: &str) {
    println!(
        "{:<14} {:<14} {:>8} {:>9} {:>8} {:>12}  Verdict",
        "Instrument",
        "Best model",
        "Viol95",
        "p95",
        "Viol99",
        metric.to_uppercase()
    );
    for (instrument, outcome) in rankings {
        let best = &outcome.best;
        let aux = outcome
            .auxiliary
            .map(|v| format!("{v:.6}"))
            .unwrap_or_else(|| "—".into());
        println!(
            "{:<14} {:<14} {:>7.2}% {:>9} {:>7.2}% {:>12}  {}",
            instrument,
            best.model,
            best.viol_rate_95() * 100.0,
            format_p(&best.kupiec_95),
            best.viol_rate_99() * 100.0,
            aux,
            outcome.verdict_95,
        );
    }
}

// ─── cohorts ────────────────────────────────────────────────────────

fn cohorts_command(summary: &Path, config: &Path) -> Result<()> {
    let cfg = load_config(Some(config))?;
    let membership = cfg.cohorts.membership()?;
    let table = read_summary(summary)?;

    for instrument in unassigned_instruments(table.results(), &membership) {
        warn!(instrument, "instrument belongs to no cohort; excluded");
    }
    let cohorts = aggregate(table.results(), &membership);
    print_cohorts(&cohorts);

    let base = summary_dir(summary);
    let path = base.join(COHORTS_FILE);
    write_file(&path, &export_cohorts_json(&cohorts)?)?;
    println!();
    println!("Cohort summaries written to {}", path.display());
    Ok(())
}

fn print_cohorts(cohorts: &BTreeMap<String, Option<CohortSummary>>) {
    println!(
        "{:<12} {:>7} {:>5} {:>10} {:>10} {:>9} {:>9}",
        "Cohort", "Instr", "Rows", "AvgViol95", "AvgViol99", "AvgP95", "P95>0.05"
    );
    for (name, summary) in cohorts {
        match summary {
            Some(s) => println!(
                "{:<12} {:>7} {:>5} {:>10} {:>10} {:>9} {:>9}",
                name,
                s.instrument_count,
                s.row_count,
                format_pct(s.avg_viol_rate_95),
                format_pct(s.avg_viol_rate_99),
                s.avg_kupiec_p95
                    .map(|p| format!("{p:.4}"))
                    .unwrap_or_else(|| "—".into()),
                format_pct(s.pct_kupiec95_ok),
            ),
            None => println!("{name:<12} (no valid data)"),
        }
    }
}

/// Directory of the summary file, `.` for a bare file name.
fn summary_dir(summary: &Path) -> &Path {
    match summary.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn format_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "—".into())
}
