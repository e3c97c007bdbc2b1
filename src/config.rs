//! Run configuration threaded through the driver and the ports.
//!
//! Every tunable lives in one [`SynthesisConfig`] value built by the caller
//! (usually the CLI); nothing in the engine reads global state. The default
//! queue-cap and expected-population tables reproduce the tuning the system
//! shipped with; both can be overridden wholesale.

use crate::filters::likeness::Thresholds;
use crate::filters::rarity::RarityParams;

/// How the level pipeline is driven.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ExecutionMode {
    /// Single control flow, recursive cascade with cooperative yield.
    #[default]
    Serial,
    /// One long-running worker per level.
    Threaded,
}

/// What happens to molecules admitted at the terminal level.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TerminalPolicy {
    /// Emit and drop; the terminal level is never queued.
    #[default]
    Discard,
    /// Keep the terminal queue so callers can inspect it after the run.
    Retain,
}

/// Workers at or above this level skip output backpressure entirely; the
/// populations up there are small enough to pass through unthrottled.
pub const UNTHROTTLED_LEVEL: usize = 13;

/// Full configuration for one enumeration run.
#[derive(Clone, Debug)]
pub struct SynthesisConfig {
    /// Drug-likeness thresholds.
    pub thresholds: Thresholds,
    /// Upper bound *K* on the synthesis level; level *K* is terminal.
    pub level_bound: usize,
    /// First level at which the probabilistic rarity filter applies.
    pub rarity_start_level: usize,
    /// Reference distributions of the rarity filter.
    pub rarity: RarityParams,
    /// Seed for the rarity filter's uniform stream.
    pub seed: u64,
    /// Serial or threaded driving.
    pub mode: ExecutionMode,
    /// Terminal-level queue policy.
    pub terminal_policy: TerminalPolicy,
    /// Per-level soft queue caps (index = level, 0 = unbounded); `None`
    /// selects the built-in table.
    pub queue_caps: Option<Vec<usize>>,
    /// Per-level expected populations used to size Bloom filters; `None`
    /// selects the built-in table.
    pub level_populations: Option<Vec<u64>>,
    /// False-positive target of each per-level filter.
    pub level_fp_rate: f64,
    /// False-positive target of the global filter.
    pub global_fp_rate: f64,
    /// Canonical identity that short-circuits the run when reached.
    pub validation_identity: Option<String>,
    /// Similarity ratio at which the validation probe reports a hit.
    pub match_threshold: f64,
    /// Worker-pool size hint for pooled [`ChemOracle`](crate::ports::ChemOracle)
    /// adapters; the built-in signature oracle needs no pool and ignores it.
    pub oracle_pool: usize,
    /// Identity lines per output file before rotation and compression.
    pub rotation_cap: u64,
    /// Structure blocks per 3-D output file before rotation.
    pub sdf_rotation_cap: u64,
    /// Suffix appended to the output directory name.
    pub output_dir_suffix: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            level_bound: 20,
            rarity_start_level: 5,
            rarity: RarityParams::default(),
            seed: 0,
            mode: ExecutionMode::default(),
            terminal_policy: TerminalPolicy::default(),
            queue_caps: None,
            level_populations: None,
            level_fp_rate: 1e-3,
            global_fp_rate: 1e-2,
            validation_identity: None,
            match_threshold: 0.95,
            oracle_pool: 15,
            rotation_cap: 250_000,
            sdf_rotation_cap: 25_000,
            output_dir_suffix: String::new(),
        }
    }
}

impl SynthesisConfig {
    /// Soft cap of the given level's queue; 0 means unbounded.
    pub fn queue_cap(&self, level: usize) -> usize {
        if let Some(caps) = &self.queue_caps {
            return caps.get(level).copied().unwrap_or(0);
        }
        default_queue_cap(level)
    }

    /// Expected population of the given level, used to size its filter.
    pub fn level_population(&self, level: usize) -> u64 {
        if let Some(populations) = &self.level_populations {
            return populations.get(level).copied().unwrap_or(0);
        }
        default_level_population(level)
    }

    /// Sum of the expected populations of all filtered levels; sizes the
    /// global filter.
    pub fn global_population(&self) -> u64 {
        (2..=self.level_bound)
            .map(|level| self.level_population(level))
            .sum()
    }
}

fn default_queue_cap(level: usize) -> usize {
    match level {
        0 | 1 => 0,
        2 => 300,
        3 => 10,
        4 => 200,
        5 => 300,
        6..=8 => 500,
        9..=12 => 1_000,
        _ => 500,
    }
}

fn default_level_population(level: usize) -> u64 {
    match level {
        0 | 1 => 0,
        2 => 500,
        3 => 10_000,
        4 => 300_000,
        5 => 1_000_000,
        6 => 5_000_000,
        7 => 15_000_000,
        8..=10 => 30_000_000,
        11 => 15_000_000,
        12 => 5_000_000,
        13 => 2_500_000,
        14 => 1_000_000,
        15 => 500_000,
        16 => 100_000,
        17 => 50_000,
        18 => 25_000,
        19 => 10_000,
        20 => 5_000,
        _ => 1_000,
    }
}
