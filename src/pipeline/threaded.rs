//! Threaded driver: one long-running worker per level.
//!
//! Worker *k* receives level *k* - 1 molecules over a channel, composes each
//! against the base set, and admits survivors into the level-*k* channel.
//! Channel disconnection doubles as the completion flag: when the producer
//! of level *k* - 1 exits it drops its sender, and worker *k* finishes once
//! the channel is both disconnected and empty. Backpressure is the bounded
//! channel itself; levels at or above the unthrottled boundary (and the
//! terminal level) use unbounded channels because their populations are
//! small. Cancellation is polled at every queue operation through the
//! receive and send timeouts.

use crate::config::{TerminalPolicy, UNTHROTTLED_LEVEL};
use crate::errors::SynthesisError;
use crate::molecule::Molecule;
use crate::pipeline::SharedEngine;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::time::Duration;
use tracing::debug;

/// How long queue operations wait before re-checking the cancel flag.
const QUEUE_POLL: Duration = Duration::from_millis(50);

/// Seeds level 2, runs the worker tower, and returns whatever the terminal
/// level retained.
pub(crate) fn run(shared: &SharedEngine<'_>) -> Result<Vec<Molecule>, SynthesisError> {
    let bound = shared.config.level_bound;
    let retain_terminal = shared.config.terminal_policy == TerminalPolicy::Retain;

    let mut senders: Vec<Option<Sender<Molecule>>> = (0..=bound).map(|_| None).collect();
    let mut receivers: Vec<Option<Receiver<Molecule>>> = (0..=bound).map(|_| None).collect();

    for level in 2..=bound {
        let terminal = level == bound;
        if terminal && !retain_terminal {
            continue;
        }
        // Level 2 is fully seeded before the workers start, and the high
        // levels flow through unthrottled.
        let cap = if level == 2 || terminal || level >= UNTHROTTLED_LEVEL {
            0
        } else {
            shared.config.queue_cap(level)
        };
        let (tx, rx) = if cap == 0 { unbounded() } else { bounded(cap) };
        senders[level] = Some(tx);
        receivers[level] = Some(rx);
    }

    // Seed level 2; dropping the sender afterwards signals completion to the
    // level-3 worker.
    {
        let seed_tx = senders[2].take();
        shared.seed_level_two(&mut |molecule| {
            if let Some(tx) = &seed_tx {
                let _ = tx.send(molecule);
            }
        })?;
    }
    shared.levels.retire(1);
    shared.levels.mark_draining(2);

    let mut worker_results: Vec<Result<(), SynthesisError>> = Vec::new();
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for level in 3..=bound {
            let rx = receivers[level - 1].take().expect("input channel exists");
            let tx = senders[level].take();
            handles.push(scope.spawn(move || worker(shared, level, rx, tx)));
        }

        for handle in handles {
            match handle.join() {
                Ok(result) => worker_results.push(result),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });

    for result in worker_results {
        result?;
    }

    let terminal = match receivers[bound].take() {
        Some(rx) => rx.try_iter().collect(),
        None => Vec::new(),
    };
    Ok(terminal)
}

/// Body of the level-`level` worker: consume level - 1, produce `level`.
fn worker(
    shared: &SharedEngine<'_>,
    level: usize,
    rx: Receiver<Molecule>,
    tx: Option<Sender<Molecule>>,
) -> Result<(), SynthesisError> {
    debug!(level, "level worker started");

    let result = worker_loop(shared, level, &rx, &tx);
    if result.is_err() {
        // Fatal errors drain the whole tower.
        shared.request_cancel();
    }

    // Production into this level is over and the input queue is consumed;
    // release the filter now, the queue dies with the dropped channel ends.
    shared.dedup.retire_level(level);
    shared.levels.mark_draining(level);
    shared.levels.retire(level - 1);
    debug!(level, "level worker finished");

    result
}

fn worker_loop(
    shared: &SharedEngine<'_>,
    level: usize,
    rx: &Receiver<Molecule>,
    tx: &Option<Sender<Molecule>>,
) -> Result<(), SynthesisError> {
    loop {
        if shared.cancelled() {
            return Ok(());
        }

        let molecule = match rx.recv_timeout(QUEUE_POLL) {
            Ok(molecule) => molecule,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };
        shared.note_processed(level - 1, rx.len());

        for base in &shared.base {
            if shared.cancelled() {
                return Ok(());
            }
            for child in molecule.compose(base, &shared.gates) {
                shared.admit_child(level, child, &mut |m| send_backpressured(shared, tx, m))?;
            }
        }
    }
}

/// Blocking send that keeps polling the cancel flag; molecules bound for a
/// discarding terminal (no sender) or a torn-down consumer are dropped.
fn send_backpressured(shared: &SharedEngine<'_>, tx: &Option<Sender<Molecule>>, molecule: Molecule) {
    let Some(tx) = tx else {
        return;
    };

    let mut pending = molecule;
    loop {
        if shared.cancelled() {
            return;
        }
        match tx.send_timeout(pending, QUEUE_POLL) {
            Ok(()) => return,
            Err(SendTimeoutError::Timeout(back)) => pending = back,
            Err(SendTimeoutError::Disconnected(_)) => return,
        }
    }
}
