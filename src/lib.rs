//! A combinatorial molecular-structure enumerator in pure Rust.
//!
//! Given a small library of fragment building blocks of two kinds, *rigid*
//! (skeletal, with typed single-slot connection stubs and allow-lists) and
//! *linker* (flexible, with untyped stubs and per-stub fan-out limits),
//! `wohler` exhaustively constructs all larger molecules reachable by
//! joining one fragment at a time, and streams each accepted molecule to a
//! persistent sink.
//!
//! The crate is named for Friedrich **Wöhler**, whose 1828 urea synthesis
//! first showed that organic molecules can be built rather than found.
//!
//! # Overview
//!
//! Enumeration is breadth-first across numbered levels: level *k* holds the
//! molecules assembled from exactly *k* fragments. Each level feeds the
//! next through a shared admit path:
//!
//! 1. **Composition:** every queued molecule is composed against every base
//!    fragment; each atom pair allowed by the connection algebra yields one
//!    candidate.
//! 2. **Drug-likeness gates:** an additive pre-filter rejects hopeless
//!    pairs before composition, and absolute thresholds reject candidates
//!    whose estimated descriptors are out of bounds.
//! 3. **Rarity sampling:** at higher levels a seeded six-factor rejection
//!    sampler prunes improbable molecules.
//! 4. **Dedup cascade:** a per-level Bloom filter and a global Bloom filter
//!    over canonical identities drop duplicates in O(1) and bounded memory.
//! 5. **Emission:** survivors are streamed to the [`Sink`](ports::Sink) and
//!    queued for the next level.
//!
//! The pipeline runs either as a single-threaded recursive cascade or as a
//! tower of per-level workers; both honor per-level queue caps as
//! backpressure. The chemistry itself (canonical identities, fragment
//! descriptors) lives behind the [`ChemOracle`](ports::ChemOracle) port; a
//! deterministic structural-signature oracle is built in.
//!
//! # Quick start
//!
//! ```
//! use wohler::{
//!     AtomType, CollectingSink, Descriptors, Element, Enumerator, FragmentKind,
//!     FragmentLibrary, FragmentRecord, RecordAtom, RunOutcome, SignatureOracle,
//!     SynthesisConfig,
//! };
//!
//! // One single-slot linker and one rigid that accepts it (but not a
//! // second copy of itself: its allow-list admits carbon, not nitrogen).
//! let carbon = AtomType::bare(Element::C);
//! let nitrogen = AtomType::bare(Element::N);
//! let linker = FragmentRecord {
//!     kind: FragmentKind::Linker,
//!     name: "l-bridge.sdf".to_string(),
//!     atoms: vec![RecordAtom::LinkerStub { atom_type: carbon, max_connect: 1 }],
//!     bonds: Vec::new(),
//!     descriptors: Some(Descriptors { mol_wt: 14.0, hbd: 0.0, hba1: 0.0, log_p: 0.3 }),
//! };
//! let rigid = FragmentRecord {
//!     kind: FragmentKind::Rigid,
//!     name: "r-core.sdf".to_string(),
//!     atoms: vec![RecordAtom::RigidStub { atom_type: nitrogen, allowed: vec![carbon] }],
//!     bonds: Vec::new(),
//!     descriptors: Some(Descriptors { mol_wt: 78.0, hbd: 1.0, hba1: 1.0, log_p: 1.7 }),
//! };
//!
//! let oracle = SignatureOracle::new();
//! let library = FragmentLibrary::from_records(vec![linker, rigid], &oracle)?;
//!
//! let mut config = SynthesisConfig::default();
//! config.level_bound = 3;
//!
//! let sink = CollectingSink::new();
//! let identities = sink.handle();
//! let report = Enumerator::new(library, config, Box::new(oracle), Box::new(sink)).run()?;
//!
//! // Two base fragments plus their single legal join.
//! assert_eq!(report.outcome, RunOutcome::Completed);
//! assert_eq!(identities.len(), 3);
//! # Ok::<(), wohler::SynthesisError>(())
//! ```

/// Run configuration and the built-in tuning tables.
pub mod config;
mod core;
mod enumerate;
/// Error types surfaced by the engine.
pub mod errors;
/// Drug-likeness gates, rarity sampling and the dedup cascade.
pub mod filters;
mod fragment;
mod molecule;
mod pipeline;
/// Ports to the external collaborators and their default adapters.
pub mod ports;
/// On-the-fly validation probe.
pub mod validation;

/// Full atom type: element, optional numeric tag, optional context.
pub use crate::core::atom::AtomType;
/// Tagged atom variant: simple, linker stub or rigid stub.
pub use crate::core::atom::{may_connect, Atom, AtomKind, Stub};
/// Identifier types shared across the crate.
pub use crate::core::atom::{ConnectionId, FragmentId};
/// Chemical elements and context tags of the fragment notation.
pub use crate::core::atom::{ContextTag, Element};
/// Bond primitives.
pub use crate::core::bond::{Bond, BondOrder};

/// The run configuration value threaded through driver and ports.
pub use config::{ExecutionMode, SynthesisConfig, TerminalPolicy};
/// Fatal error taxonomy.
pub use errors::{OracleFailure, SynthesisError};
/// Drug-likeness thresholds and the gates built over them.
pub use filters::likeness::{LikenessGates, Thresholds};

/// Fragment building blocks and their library.
pub use fragment::{Descriptors, Fragment, FragmentKind, FragmentLibrary, FragmentRecord, RecordAtom};
/// In-flight molecule assemblies.
pub use molecule::{FragmentCensus, Molecule};

/// The enumeration engine and its run reports.
pub use enumerate::{CancelToken, Enumerator, RunOutcome, RunReport};
/// Level lifecycle states of the pipeline.
pub use pipeline::{LevelState, StatsSnapshot};

/// Default port adapters.
pub use ports::{
    CollectingHandle, CollectingSink, OutputMode, RotatingFileSink, SdfFragmentLoader,
    SignatureOracle,
};
/// Port traits implemented by external collaborators.
pub use ports::{ChemOracle, FragmentLoader, Sink};
/// Validation probe for identity short-circuits.
pub use validation::ValidationProbe;
