//! Serial driver: a recursive cascaded worklist.
//!
//! Level *k* is consumed into level *k* + 1 until empty, but yields to
//! *k* + 1 whenever the downstream queue reaches its soft cap; the recursion
//! returns to *k* once the downstream level has drained below it. The caps
//! are backpressure, not correctness: without them breadth-first growth
//! holds every level in memory at once.

use crate::config::TerminalPolicy;
use crate::errors::SynthesisError;
use crate::molecule::Molecule;
use crate::pipeline::SharedEngine;
use std::collections::VecDeque;

/// Drains the seeded level-2 queue to completion (or cancellation) and
/// returns whatever the terminal level retained.
pub(crate) fn run(
    shared: &SharedEngine<'_>,
    queues: &mut Vec<VecDeque<Molecule>>,
) -> Result<Vec<Molecule>, SynthesisError> {
    while !queues[2].is_empty() && !shared.cancelled() {
        cascade(shared, queues, 2)?;
    }

    // Retire in level order; the per-level filters die with their levels.
    for level in 2..=shared.config.level_bound {
        shared.levels.mark_draining(level);
        shared.retire_level(level);
    }

    let terminal = match shared.config.terminal_policy {
        TerminalPolicy::Discard => Vec::new(),
        TerminalPolicy::Retain => queues[shared.config.level_bound].drain(..).collect(),
    };
    Ok(terminal)
}

fn cascade(
    shared: &SharedEngine<'_>,
    queues: &mut Vec<VecDeque<Molecule>>,
    level: usize,
) -> Result<(), SynthesisError> {
    if shared.cancelled() {
        return Ok(());
    }

    let bound = shared.config.level_bound;
    if level >= bound {
        // Terminal molecules were already emitted on admission.
        if shared.config.terminal_policy == TerminalPolicy::Discard {
            queues[level].clear();
        }
        return Ok(());
    }

    // The terminal level never throttles its producer.
    let next_cap = if level + 1 >= bound {
        0
    } else {
        shared.config.queue_cap(level + 1)
    };

    while !queues[level].is_empty() {
        while next_cap == 0 || queues[level + 1].len() < next_cap {
            let Some(molecule) = queues[level].pop_front() else {
                break;
            };
            shared.note_processed(level, queues[level].len());

            for base in &shared.base {
                for child in molecule.compose(base, &shared.gates) {
                    shared.admit_child(level + 1, child, &mut |m| queues[level + 1].push_back(m))?;
                }
            }

            if shared.cancelled() {
                return Ok(());
            }
        }

        cascade(shared, queues, level + 1)?;
        if shared.cancelled() {
            return Ok(());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::core::atom::{AtomType, Element};
    use crate::filters::dedup::DedupCascade;
    use crate::fragment::{Descriptors, FragmentKind, FragmentLibrary, FragmentRecord, RecordAtom};
    use crate::ports::{CollectingHandle, CollectingSink, SignatureOracle};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn chain_library() -> FragmentLibrary {
        let carbon = AtomType::bare(Element::C);
        let nitrogen = AtomType::bare(Element::N);
        let oracle = SignatureOracle::new();
        FragmentLibrary::from_records(
            vec![
                FragmentRecord {
                    kind: FragmentKind::Rigid,
                    name: "r1.sdf".to_string(),
                    atoms: vec![RecordAtom::RigidStub {
                        atom_type: nitrogen,
                        allowed: vec![carbon],
                    }],
                    bonds: Vec::new(),
                    descriptors: Some(Descriptors::default()),
                },
                FragmentRecord {
                    kind: FragmentKind::Linker,
                    name: "l1.sdf".to_string(),
                    atoms: vec![RecordAtom::LinkerStub {
                        atom_type: carbon,
                        max_connect: 2,
                    }],
                    bonds: Vec::new(),
                    descriptors: Some(Descriptors::default()),
                },
            ],
            &oracle,
        )
        .expect("library")
    }

    fn run_serial(config: &SynthesisConfig) -> (Vec<Molecule>, CollectingHandle, Vec<u64>) {
        let library = chain_library();
        let base: Vec<Molecule> = library
            .iter()
            .map(|fragment| Molecule::from_fragment(fragment, library.len()))
            .collect();

        let sink = CollectingSink::new();
        let handle = sink.handle();
        let shared = SharedEngine::new(
            config,
            base,
            library.num_rigids(),
            DedupCascade::new(config).expect("cascade"),
            Box::new(SignatureOracle::new()),
            Box::new(sink),
            Arc::new(AtomicBool::new(false)),
        );

        let mut queues: Vec<VecDeque<Molecule>> =
            (0..=config.level_bound).map(|_| VecDeque::new()).collect();
        shared
            .seed_level_two(&mut |m| queues[2].push_back(m))
            .expect("seed");
        shared.levels.retire(1);

        let terminal = run(&shared, &mut queues).expect("run");
        let stats = shared.stats.snapshot();
        (terminal, handle, stats.level_counts)
    }

    fn small_config(level_bound: usize) -> SynthesisConfig {
        let mut config = SynthesisConfig::default();
        config.level_bound = level_bound;
        config.level_populations = Some(vec![100; level_bound + 1]);
        config.rarity_start_level = level_bound + 1;
        config
    }

    #[test]
    fn cascade_saturates_the_two_slot_linker() {
        // One linker with two slots, one rigid: L, L+R, L+R+R and no more.
        let (terminal, handle, level_counts) = run_serial(&small_config(6));

        assert_eq!(level_counts[2], 1);
        assert_eq!(level_counts[3], 1);
        assert_eq!(level_counts[4], 0, "linker is saturated at size 3");
        assert!(terminal.is_empty());

        // Emitted = level-2 + level-3 molecules (bases are emitted by the
        // engine, which this test drives directly).
        assert_eq!(handle.len(), 2);
    }

    #[test]
    fn terminal_retention_returns_the_last_level() {
        let mut config = small_config(3);
        config.terminal_policy = TerminalPolicy::Retain;
        let (terminal, _, level_counts) = run_serial(&config);

        assert_eq!(level_counts[3], 1);
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].size(), 3);
    }

    #[test]
    fn tight_caps_do_not_change_the_result_set() {
        let mut config = small_config(6);
        config.queue_caps = Some(vec![1; 7]);
        let (_, handle, level_counts) = run_serial(&config);

        assert_eq!(level_counts[2], 1);
        assert_eq!(level_counts[3], 1);
        assert_eq!(handle.len(), 2);
    }
}
