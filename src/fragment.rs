//! Immutable fragment building blocks and the library that owns them.
//!
//! Fragments enter the system as parsed [`FragmentRecord`]s, are assigned
//! dense identifiers and globally unique connection identifiers during
//! ingestion, and never change afterwards. The library keeps rigids first:
//! fragment ids partition as `[0, R)` rigids and `[R, R + L)` linkers, and
//! the per-molecule fragment-count vector indexes this partition directly.

use crate::core::atom::{Atom, AtomType, ConnectionId, FragmentId};
use crate::core::bond::Bond;
use crate::errors::SynthesisError;
use crate::ports::{ChemOracle, FragmentLoader};
use tracing::info;

/// Drug-likeness descriptor quadruple attached to fragments and molecules.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Descriptors {
    /// Molecular weight in daltons.
    pub mol_wt: f64,
    /// Hydrogen-bond donor count.
    pub hbd: f64,
    /// Hydrogen-bond acceptor count (HBA1 model).
    pub hba1: f64,
    /// Octanol-water partition coefficient.
    pub log_p: f64,
}

/// The two kinds of fragment building blocks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FragmentKind {
    /// Skeletal fragment with single-slot, allow-listed stubs.
    Rigid,
    /// Flexible fragment with untyped stubs and per-stub fan-out limits.
    Linker,
}

/// A fragment atom as parsed from the input, before identifiers exist.
#[derive(Clone, Debug)]
pub enum RecordAtom {
    /// Atom with no external connection capacity.
    Simple {
        /// Full atom type.
        atom_type: AtomType,
    },
    /// Linker connection stub.
    LinkerStub {
        /// Full atom type.
        atom_type: AtomType,
        /// Total external bonds the stub may carry.
        max_connect: u8,
    },
    /// Rigid connection stub.
    RigidStub {
        /// Full atom type.
        atom_type: AtomType,
        /// Atom types accepted as bond partners.
        allowed: Vec<AtomType>,
    },
}

/// A parsed fragment awaiting ingestion into a [`FragmentLibrary`].
#[derive(Clone, Debug)]
pub struct FragmentRecord {
    /// Fragment kind, decided by the loader.
    pub kind: FragmentKind,
    /// Human-readable name (typically the source file name).
    pub name: String,
    /// Atoms in file order.
    pub atoms: Vec<RecordAtom>,
    /// Bonds over local atom indices.
    pub bonds: Vec<Bond>,
    /// Descriptor quadruple embedded in the record, when present.
    pub descriptors: Option<Descriptors>,
}

/// An immutable base fragment owned by a [`FragmentLibrary`].
#[derive(Clone, Debug)]
pub struct Fragment {
    id: FragmentId,
    kind: FragmentKind,
    name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    descriptors: Descriptors,
}

impl Fragment {
    /// Returns the dense library identifier.
    pub fn id(&self) -> FragmentId {
        self.id
    }

    /// Returns the fragment kind.
    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    /// Returns the fragment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the atoms, stubs included, in ingestion order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Returns the internal bonds.
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Returns the descriptor quadruple computed at ingestion.
    pub fn descriptors(&self) -> Descriptors {
        self.descriptors
    }
}

/// The full set of base fragments for one run, rigids first.
#[derive(Clone, Debug, Default)]
pub struct FragmentLibrary {
    fragments: Vec<Fragment>,
    num_rigids: usize,
    num_linkers: usize,
}

impl FragmentLibrary {
    /// Drains a loader and builds the library, rigids before linkers.
    ///
    /// Each record is validated, assigned its dense fragment id and fresh
    /// connection ids, and handed to the oracle exactly once for its
    /// descriptor quadruple.
    ///
    /// # Errors
    ///
    /// * [`SynthesisError::InputMalformed`] when a record is structurally
    ///   invalid (see [`FragmentLibrary::from_records`]).
    /// * [`SynthesisError::OracleDown`] when the oracle cannot produce
    ///   descriptors for a base fragment.
    pub fn ingest(
        loader: &mut dyn FragmentLoader,
        oracle: &dyn ChemOracle,
    ) -> Result<Self, SynthesisError> {
        let mut records = Vec::new();
        while let Some(record) = loader.next_fragment()? {
            records.push(record);
        }
        Self::from_records(records, oracle)
    }

    /// Builds the library from already-parsed records.
    ///
    /// # Errors
    ///
    /// * [`SynthesisError::InputMalformed`] when a record has no atoms, a
    ///   bond endpoint out of range, or a stub kind that contradicts the
    ///   fragment kind.
    /// * [`SynthesisError::OracleDown`] when descriptor computation fails.
    pub fn from_records(
        records: Vec<FragmentRecord>,
        oracle: &dyn ChemOracle,
    ) -> Result<Self, SynthesisError> {
        let mut rigids = Vec::new();
        let mut linkers = Vec::new();
        for record in records {
            validate_record(&record)?;
            match record.kind {
                FragmentKind::Rigid => rigids.push(record),
                FragmentKind::Linker => linkers.push(record),
            }
        }

        let num_rigids = rigids.len();
        let num_linkers = linkers.len();

        let mut fragments = Vec::with_capacity(num_rigids + num_linkers);
        let mut next_connection: ConnectionId = 1;
        for (id, record) in rigids.into_iter().chain(linkers).enumerate() {
            let descriptors = oracle
                .descriptors(&record)
                .map_err(|failure| SynthesisError::OracleDown(failure.to_string()))?;

            let atoms = record
                .atoms
                .iter()
                .map(|atom| realize_atom(atom, id, &mut next_connection))
                .collect();

            info!(
                fragment = %record.name,
                kind = ?record.kind,
                mol_wt = descriptors.mol_wt,
                hbd = descriptors.hbd,
                hba1 = descriptors.hba1,
                log_p = descriptors.log_p,
                "ingested fragment"
            );

            fragments.push(Fragment {
                id,
                kind: record.kind,
                name: record.name,
                atoms,
                bonds: record.bonds,
                descriptors,
            });
        }

        Ok(Self {
            fragments,
            num_rigids,
            num_linkers,
        })
    }

    /// Total number of base fragments; also the fragment-count vector length.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Returns `true` when the library holds no fragments.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of rigid fragments; rigid ids occupy `[0, num_rigids)`.
    pub fn num_rigids(&self) -> usize {
        self.num_rigids
    }

    /// Number of linker fragments; linker ids occupy
    /// `[num_rigids, num_rigids + num_linkers)`.
    pub fn num_linkers(&self) -> usize {
        self.num_linkers
    }

    /// Looks up a fragment by dense identifier.
    pub fn get(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id)
    }

    /// Iterates over all fragments in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }
}

fn validate_record(record: &FragmentRecord) -> Result<(), SynthesisError> {
    if record.atoms.is_empty() {
        return Err(SynthesisError::InputMalformed(format!(
            "fragment {:?} has no atoms",
            record.name
        )));
    }

    for bond in &record.bonds {
        if bond.origin >= record.atoms.len() || bond.target >= record.atoms.len() {
            return Err(SynthesisError::InputMalformed(format!(
                "fragment {:?} bond ({}, {}) references a missing atom",
                record.name, bond.origin, bond.target
            )));
        }
    }

    for (index, atom) in record.atoms.iter().enumerate() {
        let mismatched = match (record.kind, atom) {
            (FragmentKind::Rigid, RecordAtom::LinkerStub { .. }) => true,
            (FragmentKind::Linker, RecordAtom::RigidStub { .. }) => true,
            _ => false,
        };
        if mismatched {
            return Err(SynthesisError::InputMalformed(format!(
                "fragment {:?} atom {} carries a stub of the wrong kind",
                record.name, index
            )));
        }
    }

    Ok(())
}

fn realize_atom(atom: &RecordAtom, owner: FragmentId, next_connection: &mut ConnectionId) -> Atom {
    let mut take_id = || {
        let id = *next_connection;
        *next_connection += 1;
        id
    };

    match atom {
        RecordAtom::Simple { atom_type } => Atom::simple(*atom_type),
        RecordAtom::LinkerStub {
            atom_type,
            max_connect,
        } => Atom::linker_stub(*atom_type, *max_connect, take_id(), owner),
        RecordAtom::RigidStub { atom_type, allowed } => {
            Atom::rigid_stub(*atom_type, allowed.clone(), take_id(), owner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atom::{AtomKind, Element};
    use crate::core::bond::BondOrder;
    use crate::ports::SignatureOracle;

    fn carbon() -> AtomType {
        AtomType::bare(Element::C)
    }

    fn linker_record(name: &str, max_connect: u8) -> FragmentRecord {
        FragmentRecord {
            kind: FragmentKind::Linker,
            name: name.to_string(),
            atoms: vec![RecordAtom::LinkerStub {
                atom_type: carbon(),
                max_connect,
            }],
            bonds: Vec::new(),
            descriptors: Some(Descriptors {
                mol_wt: 14.0,
                hbd: 0.0,
                hba1: 0.0,
                log_p: 0.5,
            }),
        }
    }

    fn rigid_record(name: &str) -> FragmentRecord {
        FragmentRecord {
            kind: FragmentKind::Rigid,
            name: name.to_string(),
            atoms: vec![
                RecordAtom::Simple {
                    atom_type: carbon(),
                },
                RecordAtom::RigidStub {
                    atom_type: carbon(),
                    allowed: vec![carbon()],
                },
            ],
            bonds: vec![Bond::new(0, 1, BondOrder::Single)],
            descriptors: Some(Descriptors {
                mol_wt: 26.0,
                hbd: 1.0,
                hba1: 1.0,
                log_p: 0.2,
            }),
        }
    }

    #[test]
    fn ingestion_orders_rigids_before_linkers() {
        let oracle = SignatureOracle::new();
        let library = FragmentLibrary::from_records(
            vec![
                linker_record("l1.sdf", 2),
                rigid_record("r1.sdf"),
                linker_record("l2.sdf", 1),
            ],
            &oracle,
        )
        .expect("library");

        assert_eq!(library.len(), 3);
        assert_eq!(library.num_rigids(), 1);
        assert_eq!(library.num_linkers(), 2);
        assert_eq!(library.get(0).expect("rigid").kind(), FragmentKind::Rigid);
        assert_eq!(library.get(1).expect("linker").kind(), FragmentKind::Linker);
        assert_eq!(library.get(0).expect("rigid").name(), "r1.sdf");
    }

    #[test]
    fn ingestion_assigns_unique_connection_ids_to_stubs_only() {
        let oracle = SignatureOracle::new();
        let library = FragmentLibrary::from_records(
            vec![rigid_record("r1.sdf"), linker_record("l1.sdf", 2)],
            &oracle,
        )
        .expect("library");

        let mut seen = Vec::new();
        for fragment in library.iter() {
            for atom in fragment.atoms() {
                match atom.kind() {
                    AtomKind::Simple => assert!(atom.stub().is_none()),
                    _ => {
                        let stub = atom.stub().expect("stub bookkeeping");
                        assert_eq!(stub.fragment_id, fragment.id());
                        assert_eq!(stub.num_external, 0);
                        assert!(
                            !seen.contains(&stub.connection_id),
                            "duplicate connection id {}",
                            stub.connection_id
                        );
                        seen.push(stub.connection_id);
                    }
                }
            }
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn record_with_dangling_bond_is_rejected() {
        let oracle = SignatureOracle::new();
        let mut record = rigid_record("r1.sdf");
        record.bonds.push(Bond::new(0, 9, BondOrder::Single));

        let err = FragmentLibrary::from_records(vec![record], &oracle)
            .expect_err("dangling bond must fail");
        assert!(matches!(err, SynthesisError::InputMalformed(_)));
    }

    #[test]
    fn record_with_wrong_stub_kind_is_rejected() {
        let oracle = SignatureOracle::new();
        let record = FragmentRecord {
            kind: FragmentKind::Rigid,
            name: "r-bad.sdf".to_string(),
            atoms: vec![RecordAtom::LinkerStub {
                atom_type: carbon(),
                max_connect: 2,
            }],
            bonds: Vec::new(),
            descriptors: None,
        };

        let err = FragmentLibrary::from_records(vec![record], &oracle)
            .expect_err("stub kind mismatch must fail");
        assert!(matches!(err, SynthesisError::InputMalformed(_)));
    }
}
