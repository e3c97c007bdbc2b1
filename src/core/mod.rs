//! Core value primitives reused across the whole synthesis engine.
//!
//! The submodules provide canonical definitions for atoms, connection stubs
//! and bonds, including the identifiers that appear throughout the public API.

/// Atom-centric primitives such as [`AtomType`](crate::AtomType) and the
/// connection algebra.
pub mod atom;
/// Bond-centric primitives such as [`Bond`](crate::Bond) and
/// [`BondOrder`](crate::BondOrder).
pub mod bond;
