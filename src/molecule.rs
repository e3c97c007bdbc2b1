//! In-flight molecule assemblies and the composition primitive.
//!
//! A [`Molecule`] is a transient value: it is created by composition (or
//! seeded from a base fragment), travels through exactly one level queue,
//! is composed against every base fragment, and is then dropped. Its
//! canonical identity has been streamed to the sink by the time it is
//! dequeued, so nothing is lost when it dies.

use crate::core::atom::{may_connect, Atom, ConnectionId};
use crate::core::bond::{Bond, BondOrder};
use crate::filters::likeness::{estimate, LikenessGates};
use crate::fragment::{Descriptors, Fragment};

/// Per-molecule totals of linker and rigid fragment copies.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FragmentCensus {
    /// Total rigid fragment copies.
    pub rigids: u32,
    /// Total linker fragment copies.
    pub linkers: u32,
}

/// A molecule under assembly: atoms, bonds, fragment multiset and the
/// estimated descriptor quadruple.
#[derive(Clone, Debug)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    fragment_counts: Vec<u16>,
    joints: Vec<(ConnectionId, ConnectionId)>,
    descriptors: Descriptors,
}

impl Molecule {
    /// Seeds a size-1 molecule from a base fragment.
    ///
    /// # Arguments
    ///
    /// * `fragment` - The base fragment to copy.
    /// * `library_len` - Total number of base fragments; fixes the length of
    ///   the fragment-count vector.
    pub fn from_fragment(fragment: &Fragment, library_len: usize) -> Self {
        let mut fragment_counts = vec![0; library_len];
        fragment_counts[fragment.id()] = 1;

        Self {
            atoms: fragment.atoms().to_vec(),
            bonds: fragment.bonds().to_vec(),
            fragment_counts,
            joints: Vec::new(),
            descriptors: fragment.descriptors(),
        }
    }

    /// Returns the atoms in local-index order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Returns all bonds, internal and composed.
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Returns the fragment-count vector (entry *i* = copies of fragment *i*).
    pub fn fragment_counts(&self) -> &[u16] {
        &self.fragment_counts
    }

    /// Returns the estimated descriptor quadruple.
    pub fn descriptors(&self) -> Descriptors {
        self.descriptors
    }

    /// Edge signatures of all bonds added by composition: for each join, the
    /// unordered pair of the two consumed stubs' connection ids.
    pub fn joints(&self) -> &[(ConnectionId, ConnectionId)] {
        &self.joints
    }

    /// The size of a molecule is its total number of fragment copies.
    pub fn size(&self) -> usize {
        self.fragment_counts
            .iter()
            .map(|count| usize::from(*count))
            .sum()
    }

    /// Counts linker and rigid copies given the library partition boundary
    /// (rigid ids occupy `[0, num_rigids)`).
    pub fn census(&self, num_rigids: usize) -> FragmentCensus {
        let rigids = self.fragment_counts[..num_rigids]
            .iter()
            .map(|count| u32::from(*count))
            .sum();
        let linkers = self.fragment_counts[num_rigids..]
            .iter()
            .map(|count| u32::from(*count))
            .sum();

        FragmentCensus { rigids, linkers }
    }

    /// Produces every legal one-bond join between `self` and `other`.
    ///
    /// The additive pre-filter runs first: when the estimated combination
    /// already exceeds a threshold there is no benefit to composing, and the
    /// result is empty. Otherwise each atom pair `(i, j)` that satisfies the
    /// connection algebra yields one new molecule, enumerated with `i`
    /// ascending over `self` and `j` ascending over `other` so the output
    /// order is deterministic.
    pub fn compose(&self, other: &Molecule, gates: &LikenessGates) -> Vec<Molecule> {
        if gates.pair_will_exceed(self.descriptors, other.descriptors) {
            return Vec::new();
        }

        let mut composed = Vec::new();
        for i in 0..self.atoms.len() {
            for j in 0..other.atoms.len() {
                if may_connect(&self.atoms[i], &other.atoms[j]) {
                    composed.push(self.join_at(other, i, j));
                }
            }
        }

        composed
    }

    /// Joins `self` and `other` with a single bond between atoms `i` and `j`.
    ///
    /// # Returns
    ///
    /// The combined molecule, or `None` when the two atoms do not satisfy
    /// the connection algebra.
    pub fn compose_at(&self, other: &Molecule, i: usize, j: usize) -> Option<Molecule> {
        if !may_connect(self.atoms.get(i)?, other.atoms.get(j)?) {
            return None;
        }

        Some(self.join_at(other, i, j))
    }

    /// Builds the combined molecule: `self`'s atoms first, `other`'s shifted
    /// behind them, one fresh single bond, summed fragment counts, and the
    /// affine descriptor estimate.
    fn join_at(&self, other: &Molecule, i: usize, j: usize) -> Molecule {
        let offset = self.atoms.len();

        let mut atoms = Vec::with_capacity(offset + other.atoms.len());
        atoms.extend(self.atoms.iter().cloned());
        atoms.extend(other.atoms.iter().cloned());

        let mut bonds = Vec::with_capacity(self.bonds.len() + other.bonds.len() + 1);
        bonds.extend(self.bonds.iter().copied());
        bonds.extend(other.bonds.iter().map(|bond| bond.offset_by(offset)));
        bonds.push(Bond::new(i, offset + j, BondOrder::Single));

        let left = atoms[i].stub().expect("join endpoint is a stub").connection_id;
        let right = atoms[offset + j]
            .stub()
            .expect("join endpoint is a stub")
            .connection_id;

        let mut joints = Vec::with_capacity(self.joints.len() + other.joints.len() + 1);
        joints.extend(self.joints.iter().copied());
        joints.extend(other.joints.iter().copied());
        joints.push((left.min(right), left.max(right)));

        atoms[i].record_external_bond();
        atoms[offset + j].record_external_bond();

        let fragment_counts = self
            .fragment_counts
            .iter()
            .zip(&other.fragment_counts)
            .map(|(a, b)| a + b)
            .collect();

        Molecule {
            atoms,
            bonds,
            fragment_counts,
            joints,
            descriptors: estimate(self.descriptors, other.descriptors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atom::{AtomType, Element};
    use crate::fragment::{FragmentKind, FragmentLibrary, FragmentRecord, RecordAtom};
    use crate::ports::SignatureOracle;

    fn carbon() -> AtomType {
        AtomType::bare(Element::C)
    }

    fn linker_record(max_connect: u8, mol_wt: f64) -> FragmentRecord {
        FragmentRecord {
            kind: FragmentKind::Linker,
            name: format!("l-{max_connect}.sdf"),
            atoms: vec![
                RecordAtom::LinkerStub {
                    atom_type: carbon(),
                    max_connect,
                },
                RecordAtom::Simple {
                    atom_type: carbon(),
                },
            ],
            bonds: vec![Bond::new(0, 1, BondOrder::Single)],
            descriptors: Some(Descriptors {
                mol_wt,
                hbd: 1.0,
                hba1: 2.0,
                log_p: 0.5,
            }),
        }
    }

    fn rigid_record(mol_wt: f64) -> FragmentRecord {
        FragmentRecord {
            kind: FragmentKind::Rigid,
            name: "r.sdf".to_string(),
            atoms: vec![RecordAtom::RigidStub {
                atom_type: carbon(),
                allowed: vec![carbon()],
            }],
            bonds: Vec::new(),
            descriptors: Some(Descriptors {
                mol_wt,
                hbd: 0.0,
                hba1: 1.0,
                log_p: 0.1,
            }),
        }
    }

    fn library() -> FragmentLibrary {
        let oracle = SignatureOracle::new();
        FragmentLibrary::from_records(
            vec![rigid_record(78.0), linker_record(2, 14.0)],
            &oracle,
        )
        .expect("library")
    }

    #[test]
    fn base_molecule_mirrors_its_fragment() {
        let library = library();
        let rigid = library.get(0).expect("rigid");
        let molecule = Molecule::from_fragment(rigid, library.len());

        assert_eq!(molecule.size(), 1);
        assert_eq!(molecule.fragment_counts(), &[1, 0]);
        assert_eq!(molecule.atoms().len(), rigid.atoms().len());
        assert_eq!(molecule.descriptors(), rigid.descriptors());
    }

    #[test]
    fn compose_joins_atoms_with_shifted_indices() {
        let library = library();
        let rigid = Molecule::from_fragment(library.get(0).expect("rigid"), 2);
        let linker = Molecule::from_fragment(library.get(1).expect("linker"), 2);

        let children = linker.compose(&rigid, &LikenessGates::default());
        assert_eq!(children.len(), 1);

        let child = &children[0];
        assert_eq!(child.atoms().len(), 3);
        assert_eq!(child.bonds().len(), 2);

        // The fresh bond joins linker atom 0 to the shifted rigid atom.
        let joined = child.bonds().last().expect("composed bond");
        assert_eq!((joined.origin, joined.target), (0, 2));
        assert_eq!(joined.order, BondOrder::Single);

        // Both endpoint stubs consumed one slot.
        assert_eq!(child.atoms()[0].stub().expect("linker stub").num_external, 1);
        assert_eq!(child.atoms()[2].stub().expect("rigid stub").num_external, 1);

        // The join is recorded as an unordered connection-id pair.
        let linker_id = child.atoms()[0].stub().expect("linker stub").connection_id;
        let rigid_id = child.atoms()[2].stub().expect("rigid stub").connection_id;
        assert_eq!(
            child.joints(),
            &[(linker_id.min(rigid_id), linker_id.max(rigid_id))]
        );
    }

    #[test]
    fn compose_sums_fragment_counts_and_estimates_descriptors() {
        let library = library();
        let rigid = Molecule::from_fragment(library.get(0).expect("rigid"), 2);
        let linker = Molecule::from_fragment(library.get(1).expect("linker"), 2);

        let child = &linker.compose(&rigid, &LikenessGates::default())[0];
        assert_eq!(child.fragment_counts(), &[1, 1]);
        assert_eq!(child.size(), 2);
        assert_eq!(child.census(1), FragmentCensus { rigids: 1, linkers: 1 });

        let expected = estimate(linker.descriptors(), rigid.descriptors());
        assert_eq!(child.descriptors(), expected);
    }

    #[test]
    fn compose_respects_linker_capacity() {
        let library = library();
        let rigid = Molecule::from_fragment(library.get(0).expect("rigid"), 2);
        let linker = Molecule::from_fragment(library.get(1).expect("linker"), 2);
        let gates = LikenessGates::default();

        let two = &linker.compose(&rigid, &gates)[0];
        let three = &two.compose(&rigid, &gates)[0];
        assert_eq!(three.size(), 3);

        // Both slots of the linker stub are now used; nothing can attach.
        assert!(three.compose(&rigid, &gates).is_empty());
    }

    #[test]
    fn additive_pre_filter_short_circuits_composition() {
        let oracle = SignatureOracle::new();
        let heavy = FragmentLibrary::from_records(
            vec![rigid_record(400.0), linker_record(2, 400.0)],
            &oracle,
        )
        .expect("library");

        let rigid = Molecule::from_fragment(heavy.get(0).expect("rigid"), 2);
        let linker = Molecule::from_fragment(heavy.get(1).expect("linker"), 2);

        // 6.6746 + 0.95965 * 800 is far above the default 570 bound.
        assert!(linker.compose(&rigid, &LikenessGates::default()).is_empty());
    }

    #[test]
    fn compose_at_refuses_incompatible_atoms() {
        let library = library();
        let rigid = Molecule::from_fragment(library.get(0).expect("rigid"), 2);
        let linker = Molecule::from_fragment(library.get(1).expect("linker"), 2);

        // Atom 1 of the linker is simple.
        assert!(linker.compose_at(&rigid, 1, 0).is_none());
        // Out-of-range indices are not a panic.
        assert!(linker.compose_at(&rigid, 9, 0).is_none());
        assert!(linker.compose_at(&rigid, 0, 0).is_some());
    }
}
