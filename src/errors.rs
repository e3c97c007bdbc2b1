//! Error types surfaced by the synthesis engine.
//!
//! Only fatal conditions become errors. Per-candidate failures (a gate
//! rejection, a dedup hit, a transient oracle hiccup on one molecule) are
//! counted in the run statistics and never unwind; re-running from the same
//! inputs and seed is the recovery model.

use thiserror::Error;

/// Fatal error that aborts an enumeration run.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// A fragment record could not be parsed from the input.
    #[error("malformed fragment input: {0}")]
    InputMalformed(String),

    /// The chemistry oracle failed during setup or on a base fragment.
    #[error("chemistry oracle unavailable: {0}")]
    OracleDown(String),

    /// The sink refused a write; the run drains and exits.
    #[error("sink write failed")]
    SinkWriteFailed(#[source] std::io::Error),

    /// A Bloom filter or queue could not be constructed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Failure reported by a [`ChemOracle`](crate::ports::ChemOracle) call.
///
/// On the per-candidate path this is treated as transient: the candidate is
/// rejected, a counter bumps, and enumeration continues. During setup (base
/// fragment descriptors) it is promoted to [`SynthesisError::OracleDown`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct OracleFailure(pub String);

impl OracleFailure {
    /// Convenience constructor from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}
