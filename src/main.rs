//! Command-line front end for the enumeration engine.
//!
//! Positional arguments are fragment files (names starting with `l` are
//! linkers, `r` rigids). Exit code 0 covers both normal completion and a
//! validation hit; fatal errors exit non-zero after logging the per-level
//! counts collected so far.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use wohler::{
    Enumerator, ExecutionMode, FragmentLibrary, OutputMode, RotatingFileSink, RunOutcome,
    SdfFragmentLoader, SignatureOracle, SynthesisConfig, TerminalPolicy,
};

#[derive(Parser, Debug)]
#[command(
    name = "wohler",
    about = "Exhaustive level-wise enumeration of fragment-assembled molecules",
    version
)]
struct Cli {
    /// Fragment files; names beginning with 'l' are linkers, 'r' are rigids.
    #[arg(required = true)]
    fragments: Vec<PathBuf>,

    /// Output directory for rotated molecule files.
    #[arg(short = 'o', long = "output", default_value = "synth_output")]
    output: PathBuf,

    /// File whose first non-empty line is the validation identity to reach.
    #[arg(short = 'v', long = "validate")]
    validation: Option<PathBuf>,

    /// Similarity ratio that counts as a validation hit.
    #[arg(long = "tc", value_name = "FLOAT", default_value_t = 0.95)]
    match_threshold: f64,

    /// Molecular-weight upper bound.
    #[arg(long = "mw", value_name = "FLOAT", default_value_t = 570.0)]
    mol_wt_bound: f64,

    /// Hydrogen-bond donor upper bound.
    #[arg(long = "hd", value_name = "FLOAT", default_value_t = 5.0)]
    hbd_bound: f64,

    /// Hydrogen-bond acceptor upper bound.
    #[arg(long = "ha", value_name = "FLOAT", default_value_t = 10.0)]
    hba1_bound: f64,

    /// Partition-coefficient upper bound.
    #[arg(long = "lp", value_name = "FLOAT", default_value_t = 7.2)]
    log_p_bound: f64,

    /// Level upper bound K; no molecule uses more than K fragments.
    #[arg(long = "hl", value_name = "INT", default_value_t = 20)]
    level_bound: usize,

    /// First level at which the probabilistic rarity filter applies.
    #[arg(long = "prob-level", value_name = "INT", default_value_t = 5)]
    prob_level: usize,

    /// Emit only identity lines instead of structure blocks.
    #[arg(long = "smi-only")]
    smi_only: bool,

    /// Drive the pipeline serially (the default).
    #[arg(long, conflicts_with = "threaded")]
    serial: bool,

    /// Drive the pipeline with one worker per level.
    #[arg(long)]
    threaded: bool,

    /// Worker-pool size hint for pooled oracle adapters.
    #[arg(long = "pool", value_name = "INT", default_value_t = 15)]
    pool: usize,

    /// Suffix appended to the output directory name.
    #[arg(long = "odir", value_name = "SUFFIX", default_value = "")]
    output_suffix: String,

    /// Seed for the rarity filter's uniform stream.
    #[arg(long, value_name = "INT", default_value_t = 0)]
    seed: u64,

    /// Keep the terminal level queued instead of discarding it.
    #[arg(long = "retain-terminal")]
    retain_terminal: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wohler=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let oracle = SignatureOracle::new();
    let mut loader = SdfFragmentLoader::open(&cli.fragments)?;
    let library = FragmentLibrary::ingest(&mut loader, &oracle)?;
    info!(
        rigids = library.num_rigids(),
        linkers = library.num_linkers(),
        "fragment library loaded"
    );

    let mut output_dir = cli.output.clone();
    if !config.output_dir_suffix.is_empty() {
        let mut name = output_dir.file_name().unwrap_or_default().to_owned();
        name.push(&config.output_dir_suffix);
        output_dir.set_file_name(name);
    }

    let (mode, cap) = if cli.smi_only {
        (OutputMode::IdentityOnly, config.rotation_cap)
    } else {
        (OutputMode::Structures, config.sdf_rotation_cap)
    };
    let sink = RotatingFileSink::create(&output_dir, mode, cap)
        .with_context(|| format!("cannot open output directory {}", output_dir.display()))?;

    let report = Enumerator::new(library, config, Box::new(oracle), Box::new(sink)).run()?;

    match &report.outcome {
        RunOutcome::Completed => info!("enumeration completed"),
        RunOutcome::ValidationHit { identity } => {
            info!(identity = %identity, "validation identity was synthesized")
        }
        RunOutcome::Cancelled => info!("enumeration cancelled"),
    }
    if let Some((identity, ratio)) = &report.best_validation_match {
        info!(identity = %identity, ratio = *ratio, "closest match to the validation identity");
    }

    let emitted = report.stats.emitted;
    let rejected = report.stats.gate_rejected
        + report.stats.rarity_rejected
        + report.stats.dedup_rejected
        + report.stats.oracle_failures;
    let total = emitted + rejected;
    if total > 0 {
        info!(
            emitted,
            rejected,
            rejected_share = %format!("{:.1}%", 100.0 * rejected as f64 / total as f64),
            "candidate totals"
        );
    }

    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<SynthesisConfig> {
    let mut config = SynthesisConfig::default();

    config.thresholds.mol_wt = cli.mol_wt_bound;
    config.thresholds.hbd = cli.hbd_bound;
    config.thresholds.hba1 = cli.hba1_bound;
    config.thresholds.log_p = cli.log_p_bound;
    config.level_bound = cli.level_bound;
    config.rarity_start_level = cli.prob_level;
    config.seed = cli.seed;
    config.match_threshold = cli.match_threshold;
    config.output_dir_suffix = cli.output_suffix.clone();
    config.oracle_pool = cli.pool;
    config.mode = match (cli.serial, cli.threaded) {
        (_, true) => ExecutionMode::Threaded,
        _ => ExecutionMode::Serial,
    };
    config.terminal_policy = if cli.retain_terminal {
        TerminalPolicy::Retain
    } else {
        TerminalPolicy::Discard
    };

    if let Some(path) = &cli.validation {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read validation file {}", path.display()))?;
        let identity = contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .with_context(|| format!("validation file {} is empty", path.display()))?;
        config.validation_identity = Some(identity.to_string());
    }

    Ok(config)
}
