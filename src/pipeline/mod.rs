//! Level pipeline shared by the serial and threaded drivers.
//!
//! Level *k* holds molecules assembled from exactly *k* fragments. Both
//! drivers move molecules through the same admit path: drug-likeness gates,
//! the rarity sampler, canonicalization, the dedup cascade, and finally the
//! sink and the successor queue. The drivers differ only in how the
//! per-level queues are represented and scheduled.

use crate::config::{SynthesisConfig, TerminalPolicy};
use crate::errors::SynthesisError;
use crate::filters::dedup::DedupCascade;
use crate::filters::likeness::LikenessGates;
use crate::filters::rarity::RarityFilter;
use crate::molecule::Molecule;
use crate::ports::{ChemOracle, Sink};
use crate::validation::ValidationProbe;
use itertools::Itertools;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) mod serial;
pub(crate) mod threaded;

/// Molecules processed between progress log lines.
const PROGRESS_INTERVAL: u64 = 1_000;

/// Lifecycle of one synthesis level.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LevelState {
    /// Nothing has been enqueued yet.
    Pending,
    /// At least one molecule has been admitted into the level.
    Active,
    /// The predecessor is retired; the level drains toward retirement.
    Draining,
    /// Terminal: the level's filter and queue have been released.
    Retired,
}

/// State-machine bookkeeping for all levels of a run.
pub(crate) struct LevelTable {
    states: Vec<Mutex<LevelState>>,
}

impl LevelTable {
    pub(crate) fn new(level_bound: usize) -> Self {
        Self {
            states: (0..=level_bound)
                .map(|_| Mutex::new(LevelState::Pending))
                .collect(),
        }
    }

    pub(crate) fn state(&self, level: usize) -> LevelState {
        *self.states[level].lock()
    }

    /// First admission into a pending level activates it.
    pub(crate) fn mark_active(&self, level: usize) {
        let mut state = self.states[level].lock();
        if *state == LevelState::Pending {
            *state = LevelState::Active;
        }
    }

    /// Production into the level has ended; only draining remains.
    pub(crate) fn mark_draining(&self, level: usize) {
        let mut state = self.states[level].lock();
        if matches!(*state, LevelState::Pending | LevelState::Active) {
            *state = LevelState::Draining;
        }
    }

    /// Terminal transition; idempotent.
    pub(crate) fn retire(&self, level: usize) {
        *self.states[level].lock() = LevelState::Retired;
    }
}

/// Counters collected across an entire run. All increments are relaxed; the
/// numbers are reporting, not synchronization.
pub(crate) struct RunStats {
    level_counts: Vec<AtomicU64>,
    generated: AtomicU64,
    gate_rejected: AtomicU64,
    rarity_rejected: AtomicU64,
    dedup_rejected: AtomicU64,
    oracle_failures: AtomicU64,
    emitted: AtomicU64,
    processed: AtomicU64,
}

impl RunStats {
    fn new(level_bound: usize) -> Self {
        Self {
            level_counts: (0..=level_bound).map(|_| AtomicU64::new(0)).collect(),
            generated: AtomicU64::new(0),
            gate_rejected: AtomicU64::new(0),
            rarity_rejected: AtomicU64::new(0),
            dedup_rejected: AtomicU64::new(0),
            oracle_failures: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            level_counts: self
                .level_counts
                .iter()
                .map(|count| count.load(Ordering::Relaxed))
                .collect(),
            generated: self.generated.load(Ordering::Relaxed),
            gate_rejected: self.gate_rejected.load(Ordering::Relaxed),
            rarity_rejected: self.rarity_rejected.load(Ordering::Relaxed),
            dedup_rejected: self.dedup_rejected.load(Ordering::Relaxed),
            oracle_failures: self.oracle_failures.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value copy of the run counters, reported to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Molecules admitted per level (index = level).
    pub level_counts: Vec<u64>,
    /// Candidates produced by the composer.
    pub generated: u64,
    /// Candidates rejected by the absolute drug-likeness gate.
    pub gate_rejected: u64,
    /// Candidates rejected by the probabilistic rarity filter.
    pub rarity_rejected: u64,
    /// Candidates rejected as duplicates by the Bloom cascade.
    pub dedup_rejected: u64,
    /// Candidates dropped after a transient oracle failure.
    pub oracle_failures: u64,
    /// Molecules streamed to the sink (all levels).
    pub emitted: u64,
}

/// Everything the drivers and workers share for one run.
pub(crate) struct SharedEngine<'run> {
    pub(crate) config: &'run SynthesisConfig,
    pub(crate) gates: LikenessGates,
    pub(crate) base: Vec<Molecule>,
    pub(crate) num_rigids: usize,
    pub(crate) dedup: DedupCascade,
    pub(crate) rarity: Mutex<RarityFilter>,
    pub(crate) oracle: Mutex<Box<dyn ChemOracle>>,
    pub(crate) sink: Mutex<Box<dyn Sink>>,
    pub(crate) stats: RunStats,
    pub(crate) levels: LevelTable,
    pub(crate) validation: Option<Mutex<ValidationProbe>>,
    cancel: Arc<AtomicBool>,
}

impl<'run> SharedEngine<'run> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: &'run SynthesisConfig,
        base: Vec<Molecule>,
        num_rigids: usize,
        dedup: DedupCascade,
        oracle: Box<dyn ChemOracle>,
        sink: Box<dyn Sink>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let validation = config
            .validation_identity
            .as_ref()
            .map(|target| Mutex::new(ValidationProbe::new(target.clone(), config.match_threshold)));

        Self {
            gates: LikenessGates::new(config.thresholds),
            rarity: Mutex::new(RarityFilter::new(config.rarity, config.seed)),
            stats: RunStats::new(config.level_bound),
            levels: LevelTable::new(config.level_bound),
            validation,
            config,
            base,
            num_rigids,
            dedup,
            oracle: Mutex::new(oracle),
            sink: Mutex::new(sink),
            cancel,
        }
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Emits the level-1 identities: every base fragment goes straight to
    /// the sink, before any composition. Level-1 identities do not enter the
    /// Bloom cascade; composed molecules cannot reproduce them.
    pub(crate) fn emit_base_molecules(&self) -> Result<(), SynthesisError> {
        for molecule in &self.base {
            let identity = self
                .oracle
                .lock()
                .canonicalize(molecule)
                .map_err(|failure| {
                    SynthesisError::OracleDown(format!(
                        "cannot canonicalize a base fragment: {failure}"
                    ))
                })?;

            self.sink
                .lock()
                .emit(&identity, molecule)
                .map_err(SynthesisError::SinkWriteFailed)?;

            self.stats.emitted.fetch_add(1, Ordering::Relaxed);
            self.stats.level_counts[1].fetch_add(1, Ordering::Relaxed);
            self.levels.mark_active(1);
            self.observe_validation(&identity);
        }
        Ok(())
    }

    /// Seeds level 2 by composing every unordered pair of base fragments,
    /// self-pairings included.
    pub(crate) fn seed_level_two(
        &self,
        enqueue: &mut dyn FnMut(Molecule),
    ) -> Result<(), SynthesisError> {
        for pair in (0..self.base.len()).combinations_with_replacement(2) {
            if self.cancelled() {
                break;
            }
            let children = self.base[pair[0]].compose(&self.base[pair[1]], &self.gates);
            for child in children {
                self.admit_child(2, child, enqueue)?;
            }
        }
        Ok(())
    }

    /// Routes one freshly composed molecule of the given level through the
    /// gates, the rarity sampler and the dedup cascade; survivors are
    /// streamed to the sink and handed to `enqueue` (unless the level is the
    /// discarding terminal).
    pub(crate) fn admit_child(
        &self,
        level: usize,
        molecule: Molecule,
        enqueue: &mut dyn FnMut(Molecule),
    ) -> Result<(), SynthesisError> {
        self.stats.generated.fetch_add(1, Ordering::Relaxed);

        if self.gates.rejects(molecule.descriptors()) {
            self.stats.gate_rejected.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        if level >= self.config.rarity_start_level {
            let census = molecule.census(self.num_rigids);
            if !self.rarity.lock().admits(molecule.descriptors(), census) {
                self.stats.rarity_rejected.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        let identity = match self.oracle.lock().canonicalize(&molecule) {
            Ok(identity) => identity,
            Err(failure) => {
                self.stats.oracle_failures.fetch_add(1, Ordering::Relaxed);
                debug!(level, %failure, "canonicalization failed; candidate dropped");
                return Ok(());
            }
        };

        if !self.dedup.admit(level, &identity) {
            self.stats.dedup_rejected.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        self.sink
            .lock()
            .emit(&identity, &molecule)
            .map_err(SynthesisError::SinkWriteFailed)?;
        self.stats.emitted.fetch_add(1, Ordering::Relaxed);
        self.stats.level_counts[level].fetch_add(1, Ordering::Relaxed);
        self.levels.mark_active(level);
        self.observe_validation(&identity);

        let terminal = level >= self.config.level_bound;
        if !terminal || self.config.terminal_policy == TerminalPolicy::Retain {
            enqueue(molecule);
        }
        Ok(())
    }

    /// Bumps the processed counter and logs progress periodically.
    pub(crate) fn note_processed(&self, level: usize, queue_len: usize) {
        let processed = self.stats.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % PROGRESS_INTERVAL == 0 {
            info!(
                level,
                queue_len,
                processed,
                emitted = self.stats.emitted.load(Ordering::Relaxed),
                "processing molecules"
            );
        }
    }

    /// Releases a level's filter and marks it retired; idempotent.
    pub(crate) fn retire_level(&self, level: usize) {
        self.dedup.retire_level(level);
        if self.levels.state(level) != LevelState::Retired {
            self.levels.retire(level);
            debug!(
                level,
                molecules = self.stats.level_counts[level].load(Ordering::Relaxed),
                "level retired"
            );
        }
    }

    fn observe_validation(&self, identity: &str) {
        if let Some(probe) = &self.validation {
            if probe.lock().observe(identity) {
                self.request_cancel();
            }
        }
    }
}
