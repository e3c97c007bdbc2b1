//! Default chemistry oracle backed by structural signatures.
//!
//! The signature identity encodes what composition actually determines: the
//! multiset of base fragments in the molecule and the multiset of connection
//! stubs its external bonds consumed. Both components are sorted, so the
//! identity is deterministic, free of any 3-D information, and invariant
//! under the order in which the molecule was assembled. A chemistry-grade
//! canonicalizer can replace this adapter behind the same trait.

use crate::errors::OracleFailure;
use crate::fragment::{Descriptors, FragmentRecord, RecordAtom};
use crate::molecule::Molecule;
use crate::ports::ChemOracle;
use std::fmt::Write;

/// Deterministic, coordinate-free canonicalizer over fragment signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureOracle;

impl SignatureOracle {
    /// Creates the oracle.
    pub fn new() -> Self {
        Self
    }
}

impl ChemOracle for SignatureOracle {
    fn canonicalize(&self, molecule: &Molecule) -> Result<String, OracleFailure> {
        let mut identity = String::new();

        let mut first = true;
        for (fragment_id, count) in molecule.fragment_counts().iter().enumerate() {
            if *count == 0 {
                continue;
            }
            if !first {
                identity.push('.');
            }
            first = false;
            write!(identity, "f{fragment_id}x{count}").expect("write to string");
        }

        let mut joints = molecule.joints().to_vec();
        joints.sort_unstable();

        identity.push('|');
        for (index, (a, b)) in joints.iter().enumerate() {
            if index > 0 {
                identity.push('.');
            }
            write!(identity, "c{a}-c{b}").expect("write to string");
        }

        Ok(identity)
    }

    fn descriptors(&self, record: &FragmentRecord) -> Result<Descriptors, OracleFailure> {
        if let Some(descriptors) = record.descriptors {
            return Ok(descriptors);
        }

        // No embedded block: fall back to a bare mass sum over the atoms.
        let mol_wt = record
            .atoms
            .iter()
            .map(|atom| {
                let atom_type = match atom {
                    RecordAtom::Simple { atom_type }
                    | RecordAtom::LinkerStub { atom_type, .. }
                    | RecordAtom::RigidStub { atom_type, .. } => atom_type,
                };
                atom_type.element.standard_mass()
            })
            .sum();

        Ok(Descriptors {
            mol_wt,
            hbd: 0.0,
            hba1: 0.0,
            log_p: 0.0,
        })
    }
}
