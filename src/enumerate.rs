//! The enumeration engine: seed, drive, retire, report.
//!
//! An [`Enumerator`] owns the fragment library, the configuration and the
//! two external collaborators (oracle and sink), seeds levels 1 and 2, and
//! drives the level pipeline in the configured mode until the terminal
//! level completes, the validation identity is reached, or the caller
//! cancels.

use crate::config::{ExecutionMode, SynthesisConfig};
use crate::errors::SynthesisError;
use crate::filters::dedup::DedupCascade;
use crate::fragment::FragmentLibrary;
use crate::molecule::Molecule;
use crate::pipeline::{serial, threaded, SharedEngine, StatsSnapshot};
use crate::ports::{ChemOracle, Sink};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The terminal level completed normally.
    Completed,
    /// The validation identity was reached and the pipeline short-circuited.
    ValidationHit {
        /// The admitted identity that matched the validation target.
        identity: String,
    },
    /// An external cancellation request stopped the run.
    Cancelled,
}

/// Result of a finished run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Counters collected across the run.
    pub stats: StatsSnapshot,
    /// Closest identity to the validation target and its similarity ratio,
    /// when a validation identity was supplied.
    pub best_validation_match: Option<(String, f64)>,
    /// Molecules retained at the terminal level (empty unless the terminal
    /// policy retains them).
    pub terminal: Vec<Molecule>,
}

/// Cooperative cancellation handle for a running enumeration.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Requests a clean shutdown; polled at every queue operation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The multi-level synthesis engine.
pub struct Enumerator {
    library: FragmentLibrary,
    config: SynthesisConfig,
    oracle: Box<dyn ChemOracle>,
    sink: Box<dyn Sink>,
    cancel: Arc<AtomicBool>,
}

impl Enumerator {
    /// Assembles an engine over an ingested library and the two ports.
    pub fn new(
        library: FragmentLibrary,
        config: SynthesisConfig,
        oracle: Box<dyn ChemOracle>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            library,
            config,
            oracle,
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a token that cancels this run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken(Arc::clone(&self.cancel))
    }

    /// Runs the enumeration to completion and reports on it.
    ///
    /// # Errors
    ///
    /// * [`SynthesisError::ResourceExhausted`] when the configuration is
    ///   unusable or a Bloom filter cannot be built.
    /// * [`SynthesisError::OracleDown`] when a base fragment cannot be
    ///   canonicalized.
    /// * [`SynthesisError::SinkWriteFailed`] when the sink refuses a write.
    pub fn run(self) -> Result<RunReport, SynthesisError> {
        let Enumerator {
            library,
            config,
            oracle,
            sink,
            cancel,
        } = self;

        if config.level_bound < 2 {
            return Err(SynthesisError::ResourceExhausted(format!(
                "level bound {} leaves nothing to enumerate (need at least 2)",
                config.level_bound
            )));
        }
        if library.is_empty() {
            warn!("fragment library is empty; the run will emit nothing");
        }

        let dedup = DedupCascade::new(&config)?;
        let base: Vec<Molecule> = library
            .iter()
            .map(|fragment| Molecule::from_fragment(fragment, library.len()))
            .collect();

        info!(
            rigids = library.num_rigids(),
            linkers = library.num_linkers(),
            level_bound = config.level_bound,
            mode = ?config.mode,
            "starting enumeration"
        );

        let shared = SharedEngine::new(
            &config,
            base,
            library.num_rigids(),
            dedup,
            oracle,
            sink,
            cancel,
        );

        let drive_result = drive(&shared);

        // Final retirement pass in level order; idempotent for whatever the
        // drivers already released.
        for level in 0..=config.level_bound {
            shared.retire_level(level);
        }

        let terminal = match drive_result {
            Ok(terminal) => terminal,
            Err(err) => {
                error!(%err, "enumeration aborted");
                log_level_counts(&shared.stats.snapshot());
                return Err(err);
            }
        };

        shared
            .sink
            .lock()
            .flush()
            .map_err(SynthesisError::SinkWriteFailed)?;

        let stats = shared.stats.snapshot();
        log_level_counts(&stats);

        let mut best_validation_match = None;
        let mut validation_hit = None;
        if let Some(probe) = &shared.validation {
            let probe = probe.lock();
            validation_hit = probe.hit().map(str::to_string);
            best_validation_match = probe
                .best_match()
                .map(|(identity, ratio)| (identity.to_string(), ratio));
        }

        let outcome = match validation_hit {
            Some(identity) => RunOutcome::ValidationHit { identity },
            None if shared.cancelled() => RunOutcome::Cancelled,
            None => RunOutcome::Completed,
        };

        Ok(RunReport {
            outcome,
            stats,
            best_validation_match,
            terminal,
        })
    }
}

fn drive(shared: &SharedEngine<'_>) -> Result<Vec<Molecule>, SynthesisError> {
    shared.emit_base_molecules()?;

    match shared.config.mode {
        ExecutionMode::Serial => {
            let mut queues: Vec<VecDeque<Molecule>> = (0..=shared.config.level_bound)
                .map(|_| VecDeque::new())
                .collect();
            shared.seed_level_two(&mut |molecule| queues[2].push_back(molecule))?;
            shared.levels.retire(1);
            shared.levels.mark_draining(2);
            serial::run(shared, &mut queues)
        }
        ExecutionMode::Threaded => threaded::run(shared),
    }
}

fn log_level_counts(stats: &StatsSnapshot) {
    for (level, count) in stats.level_counts.iter().enumerate().skip(1) {
        if *count > 0 {
            info!(level, molecules = *count, "level total");
        }
    }
    info!(
        emitted = stats.emitted,
        generated = stats.generated,
        duplicates = stats.dedup_rejected,
        gate_rejected = stats.gate_rejected,
        rarity_rejected = stats.rarity_rejected,
        oracle_failures = stats.oracle_failures,
        "enumeration finished"
    );
}
