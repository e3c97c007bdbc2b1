//! Typed ports to the external collaborators: fragment input, the chemistry
//! oracle, and the streaming output sink.
//!
//! The enumeration core is written entirely against these three traits. The
//! default adapters in the submodules make the binary self-contained; a real
//! chemistry toolkit can be swapped in behind [`ChemOracle`] without touching
//! the core.

use crate::errors::{OracleFailure, SynthesisError};
use crate::fragment::{Descriptors, FragmentRecord};
use crate::molecule::Molecule;

mod loader;
mod oracle;
mod sink;

pub use loader::SdfFragmentLoader;
pub use oracle::SignatureOracle;
pub use sink::{CollectingHandle, CollectingSink, OutputMode, RotatingFileSink};

/// Produces the base fragments, one record at a time.
pub trait FragmentLoader {
    /// Returns the next parsed fragment record, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// [`SynthesisError::InputMalformed`] when a record cannot be parsed;
    /// unparseable fragment input is fatal.
    fn next_fragment(&mut self) -> Result<Option<FragmentRecord>, SynthesisError>;
}

/// The chemistry authority consulted by the core.
///
/// Implementations are treated as non-reentrant: the engine serializes all
/// calls through one lock, so a wrapped single-threaded chemistry library is
/// safe to use in threaded mode.
pub trait ChemOracle: Send {
    /// Produces the canonical line-notation identity of a molecule.
    ///
    /// Must be deterministic and must ignore any 3-D information. This is
    /// the only authority on chemical equivalence the core consults.
    ///
    /// # Errors
    ///
    /// A failure on an individual molecule is transient: the candidate is
    /// rejected and counted, and enumeration continues.
    fn canonicalize(&self, molecule: &Molecule) -> Result<String, OracleFailure>;

    /// Computes the descriptor quadruple of a base fragment.
    ///
    /// Called exactly once per fragment at ingestion; composed molecules
    /// only ever carry estimated descriptors.
    ///
    /// # Errors
    ///
    /// A failure here is fatal (the library cannot be built without
    /// descriptors).
    fn descriptors(&self, record: &FragmentRecord) -> Result<Descriptors, OracleFailure>;

    /// Optional precise drug-likeness check for final acceptance by a sink.
    ///
    /// The core's own gates are advisory estimates; sinks may consult this
    /// for an exact verdict. The default accepts everything.
    fn is_druglike_exact(&self, _molecule: &Molecule) -> Result<bool, OracleFailure> {
        Ok(true)
    }
}

/// Streaming writer for accepted molecules.
pub trait Sink: Send {
    /// Persists one accepted molecule under its canonical identity.
    ///
    /// # Errors
    ///
    /// A write failure is fatal; the run drains and exits.
    fn emit(&mut self, identity: &str, molecule: &Molecule) -> Result<(), std::io::Error>;

    /// Flushes buffered output; called once when the run ends.
    fn flush(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
}
