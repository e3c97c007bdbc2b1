//! Core atom primitives: typed connection stubs and the connection algebra.
//!
//! Atoms come in three flavors. A *simple* atom has no remaining capacity to
//! form bonds outside its own fragment. A *linker stub* belongs to a flexible
//! linker fragment and may bond to any rigid stub that admits its type, up to
//! a per-stub fan-out limit. A *rigid stub* belongs to a skeletal rigid
//! fragment, accepts exactly one external bond, and carries an explicit
//! allow-list of partner types.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Dense, stable identifier of a base fragment within a library.
pub type FragmentId = usize;

/// Globally unique identifier assigned to every connection stub when its
/// owning fragment is ingested. Stable for the lifetime of the run.
pub type ConnectionId = u32;

/// Error emitted when an atom-type string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAtomTypeError {
    /// The element symbol is not one of the supported elements.
    #[error("unrecognized element symbol {0:?}")]
    UnknownElement(String),

    /// The context suffix after the dot is not a known chemical context.
    #[error("unrecognized atom context {0:?}")]
    UnknownContext(String),
}

macro_rules! define_elements {
    ($($name:ident = $symbol:literal, $mass:literal;)*) => {
        /// Chemical elements that appear in fragment building blocks.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Element {
            $($name,)*
        }

        impl Element {
            /// Returns the element's symbol as written in fragment files.
            pub fn symbol(self) -> &'static str {
                match self {
                    $(Element::$name => $symbol,)*
                }
            }

            /// Standard atomic mass, used as a fallback molecular-weight
            /// estimate when a fragment record carries no descriptors.
            pub fn standard_mass(self) -> f64 {
                match self {
                    $(Element::$name => $mass,)*
                }
            }
        }

        impl FromStr for Element {
            type Err = ParseAtomTypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($symbol => Ok(Element::$name),)*
                    _ => Err(ParseAtomTypeError::UnknownElement(s.to_string())),
                }
            }
        }
    };
}

define_elements!(
    H = "H", 1.008;
    B = "B", 10.811;
    C = "C", 12.011;
    N = "N", 14.007;
    O = "O", 15.999;
    F = "F", 18.998;
    P = "P", 30.974;
    S = "S", 32.065;
    Cl = "Cl", 35.453;
    Br = "Br", 79.904;
    I = "I", 126.904;
);

/// Chemical-context suffix attached to an element in fragment files
/// (`N.am`, `C.ar`, `N.pl3`, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ContextTag {
    /// Amide nitrogen context (`am`).
    Amide,
    /// Aromatic context (`ar`).
    Aromatic,
    /// Trigonal-planar context (`pl`).
    Planar,
    /// Carbonyl / carboxylate context (`co`).
    Carbonyl,
    /// Charged oxygen context (`O`).
    Oxo,
    /// Carbocation context (`cat`).
    Cation,
}

impl ContextTag {
    fn as_str(self) -> &'static str {
        match self {
            ContextTag::Amide => "am",
            ContextTag::Aromatic => "ar",
            ContextTag::Planar => "pl",
            ContextTag::Carbonyl => "co",
            ContextTag::Oxo => "O",
            ContextTag::Cation => "cat",
        }
    }
}

impl FromStr for ContextTag {
    type Err = ParseAtomTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "am" => Ok(ContextTag::Amide),
            "ar" => Ok(ContextTag::Aromatic),
            "pl" => Ok(ContextTag::Planar),
            "co" => Ok(ContextTag::Carbonyl),
            "o" => Ok(ContextTag::Oxo),
            "cat" => Ok(ContextTag::Cation),
            _ => Err(ParseAtomTypeError::UnknownContext(s.to_string())),
        }
    }
}

/// Full atom type: element plus optional numeric tag and chemical context.
///
/// Parsed from the `<element>[.<context>][<digit>]` notation of fragment
/// files, so `C` is a bare carbon, `C.ar` an aromatic carbon, `C.3` an
/// sp3-tagged carbon and `N.pl3` a trigonal nitrogen with tag 3. Equality is
/// componentwise; connection allow-lists match on the full triple.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AtomType {
    /// Chemical element.
    pub element: Element,
    /// Trailing numeric tag, when present.
    pub tag: Option<u8>,
    /// Chemical-context suffix, when present.
    pub context: Option<ContextTag>,
}

impl AtomType {
    /// Creates a bare atom type with no tag or context.
    pub fn bare(element: Element) -> Self {
        Self {
            element,
            tag: None,
            context: None,
        }
    }
}

impl FromStr for AtomType {
    type Err = ParseAtomTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, suffix) = match s.find('.') {
            Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
            None => (s, None),
        };

        let element = prefix.parse()?;

        let mut tag = None;
        let mut context = None;
        if let Some(mut rest) = suffix {
            if let Some(last) = rest.chars().last().filter(char::is_ascii_digit) {
                tag = Some(last as u8 - b'0');
                rest = &rest[..rest.len() - 1];
            }
            if !rest.is_empty() {
                context = Some(rest.parse()?);
            }
        }

        Ok(Self {
            element,
            tag,
            context,
        })
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element.symbol())?;
        if self.tag.is_some() || self.context.is_some() {
            f.write_str(".")?;
            if let Some(context) = self.context {
                f.write_str(context.as_str())?;
            }
            if let Some(tag) = self.tag {
                write!(f, "{tag}")?;
            }
        }
        Ok(())
    }
}

/// Bookkeeping shared by linker and rigid stubs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Stub {
    /// Total external bonds this stub may carry.
    pub max_connect: u8,
    /// External bonds already formed through composition.
    pub num_external: u8,
    /// Globally unique connection identifier, assigned at ingestion.
    pub connection_id: ConnectionId,
    /// Identifier of the base fragment that owns this stub.
    pub fragment_id: FragmentId,
}

impl Stub {
    /// A stub can take one more bond only while strictly below its limit.
    pub fn has_capacity(&self) -> bool {
        self.num_external < self.max_connect
    }
}

/// The three atom variants handled by the connection algebra.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AtomKind {
    /// No remaining capacity for external bonds.
    Simple,
    /// Untyped stub of a linker fragment; bonds to admitting rigid stubs.
    LinkerStub(Stub),
    /// Single-slot stub of a rigid fragment with an explicit allow-list.
    RigidStub {
        /// Capacity bookkeeping (`max_connect` is always 1 for rigid stubs).
        stub: Stub,
        /// Atom types this stub accepts as bond partners.
        allowed: Vec<AtomType>,
    },
}

/// An atom inside a fragment or an in-flight molecule.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Atom {
    atom_type: AtomType,
    kind: AtomKind,
}

impl Atom {
    /// Creates a simple atom with no connection capacity.
    pub fn simple(atom_type: AtomType) -> Self {
        Self {
            atom_type,
            kind: AtomKind::Simple,
        }
    }

    /// Creates a linker stub with the given fan-out limit.
    pub fn linker_stub(
        atom_type: AtomType,
        max_connect: u8,
        connection_id: ConnectionId,
        fragment_id: FragmentId,
    ) -> Self {
        Self {
            atom_type,
            kind: AtomKind::LinkerStub(Stub {
                max_connect,
                num_external: 0,
                connection_id,
                fragment_id,
            }),
        }
    }

    /// Creates a rigid stub; rigid stubs always accept exactly one bond.
    pub fn rigid_stub(
        atom_type: AtomType,
        allowed: Vec<AtomType>,
        connection_id: ConnectionId,
        fragment_id: FragmentId,
    ) -> Self {
        Self {
            atom_type,
            kind: AtomKind::RigidStub {
                stub: Stub {
                    max_connect: 1,
                    num_external: 0,
                    connection_id,
                    fragment_id,
                },
                allowed,
            },
        }
    }

    /// Returns this atom's full type.
    pub fn atom_type(&self) -> AtomType {
        self.atom_type
    }

    /// Returns the variant payload.
    pub fn kind(&self) -> &AtomKind {
        &self.kind
    }

    /// Returns the stub bookkeeping when this atom is a stub.
    pub fn stub(&self) -> Option<&Stub> {
        match &self.kind {
            AtomKind::Simple => None,
            AtomKind::LinkerStub(stub) | AtomKind::RigidStub { stub, .. } => Some(stub),
        }
    }

    /// Records one more external bond on this stub.
    ///
    /// Callers must have checked [`may_connect`] first; a saturated stub is
    /// a logic error.
    pub(crate) fn record_external_bond(&mut self) {
        let stub = match &mut self.kind {
            AtomKind::Simple => panic!("simple atoms cannot take external bonds"),
            AtomKind::LinkerStub(stub) | AtomKind::RigidStub { stub, .. } => stub,
        };
        debug_assert!(stub.has_capacity(), "stub already saturated");
        stub.num_external += 1;
    }

    fn allows(&self, partner: AtomType) -> bool {
        match &self.kind {
            AtomKind::RigidStub { allowed, .. } => allowed.contains(&partner),
            _ => false,
        }
    }
}

/// Decides whether two atoms may be joined by a new external bond.
///
/// The relation is symmetric by construction:
///
/// 1. both atoms must be stubs with remaining capacity;
/// 2. linker-to-linker bonds are forbidden;
/// 3. a rigid stub accepts a linker stub only when its allow-list contains
///    the linker's full atom type;
/// 4. two rigid stubs connect only when each side's allow-list admits the
///    other side's atom type.
pub fn may_connect(a: &Atom, b: &Atom) -> bool {
    let (Some(stub_a), Some(stub_b)) = (a.stub(), b.stub()) else {
        return false;
    };
    if !stub_a.has_capacity() || !stub_b.has_capacity() {
        return false;
    }

    match (&a.kind, &b.kind) {
        (AtomKind::LinkerStub(_), AtomKind::LinkerStub(_)) => false,
        (AtomKind::LinkerStub(_), AtomKind::RigidStub { .. }) => b.allows(a.atom_type),
        (AtomKind::RigidStub { .. }, AtomKind::LinkerStub(_)) => a.allows(b.atom_type),
        (AtomKind::RigidStub { .. }, AtomKind::RigidStub { .. }) => {
            a.allows(b.atom_type) && b.allows(a.atom_type)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carbon() -> AtomType {
        AtomType::bare(Element::C)
    }

    fn nitrogen() -> AtomType {
        AtomType::bare(Element::N)
    }

    #[test]
    fn atom_type_parses_element_context_and_tag() {
        let plain: AtomType = "C".parse().expect("bare element");
        assert_eq!(plain, AtomType::bare(Element::C));

        let aromatic: AtomType = "C.ar".parse().expect("context");
        assert_eq!(aromatic.element, Element::C);
        assert_eq!(aromatic.context, Some(ContextTag::Aromatic));
        assert_eq!(aromatic.tag, None);

        let tagged: AtomType = "C.3".parse().expect("numeric tag");
        assert_eq!(tagged.tag, Some(3));
        assert_eq!(tagged.context, None);

        let both: AtomType = "N.pl3".parse().expect("context and tag");
        assert_eq!(both.element, Element::N);
        assert_eq!(both.context, Some(ContextTag::Planar));
        assert_eq!(both.tag, Some(3));
    }

    #[test]
    fn atom_type_rejects_unknown_components() {
        assert_eq!(
            "Xx".parse::<AtomType>(),
            Err(ParseAtomTypeError::UnknownElement("Xx".to_string()))
        );
        assert_eq!(
            "C.zz".parse::<AtomType>(),
            Err(ParseAtomTypeError::UnknownContext("zz".to_string()))
        );
    }

    #[test]
    fn atom_type_display_round_trips() {
        for text in ["C", "Cl", "C.ar", "N.pl3", "O.co2", "C.3"] {
            let parsed: AtomType = text.parse().expect(text);
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn simple_atoms_never_connect() {
        let simple = Atom::simple(carbon());
        let linker = Atom::linker_stub(carbon(), 2, 0, 0);
        let rigid = Atom::rigid_stub(carbon(), vec![carbon()], 1, 1);

        assert!(!may_connect(&simple, &simple));
        assert!(!may_connect(&simple, &linker));
        assert!(!may_connect(&rigid, &simple));
    }

    #[test]
    fn linker_to_linker_is_forbidden() {
        let a = Atom::linker_stub(carbon(), 2, 0, 0);
        let b = Atom::linker_stub(carbon(), 2, 1, 1);

        assert!(!may_connect(&a, &b));
    }

    #[test]
    fn rigid_admits_linker_through_its_allow_list() {
        let linker = Atom::linker_stub(carbon(), 2, 0, 0);
        let accepting = Atom::rigid_stub(nitrogen(), vec![carbon()], 1, 1);
        let refusing = Atom::rigid_stub(nitrogen(), vec![nitrogen()], 2, 2);

        assert!(may_connect(&linker, &accepting));
        assert!(may_connect(&accepting, &linker));
        assert!(!may_connect(&linker, &refusing));
    }

    #[test]
    fn rigid_pair_requires_mutual_admission() {
        let allows_n = Atom::rigid_stub(carbon(), vec![nitrogen()], 0, 0);
        let allows_c = Atom::rigid_stub(nitrogen(), vec![carbon()], 1, 1);
        let allows_only_n = Atom::rigid_stub(nitrogen(), vec![nitrogen()], 2, 2);

        assert!(may_connect(&allows_n, &allows_c));
        // One-sided admission is not enough.
        assert!(!may_connect(&allows_n, &allows_only_n));
    }

    #[test]
    fn allow_list_matches_the_full_atom_type() {
        let aromatic_carbon: AtomType = "C.ar".parse().expect("type");
        let linker = Atom::linker_stub(carbon(), 1, 0, 0);
        let rigid = Atom::rigid_stub(nitrogen(), vec![aromatic_carbon], 1, 1);

        // Bare C is not C.ar; the triple must match componentwise.
        assert!(!may_connect(&linker, &rigid));
    }

    #[test]
    fn saturated_stub_refuses_further_bonds() {
        let mut linker = Atom::linker_stub(carbon(), 1, 0, 0);
        let rigid = Atom::rigid_stub(nitrogen(), vec![carbon()], 1, 1);

        assert!(may_connect(&linker, &rigid));
        linker.record_external_bond();
        assert!(!linker.stub().expect("stub").has_capacity());
        assert!(!may_connect(&linker, &rigid));
    }

    #[test]
    fn may_connect_is_symmetric_across_variant_pairs() {
        let atoms = [
            Atom::simple(carbon()),
            Atom::linker_stub(carbon(), 2, 0, 0),
            Atom::linker_stub(nitrogen(), 1, 1, 1),
            Atom::rigid_stub(carbon(), vec![carbon(), nitrogen()], 2, 2),
            Atom::rigid_stub(nitrogen(), vec![carbon()], 3, 3),
            Atom::rigid_stub(nitrogen(), vec![nitrogen()], 4, 4),
        ];

        for a in &atoms {
            for b in &atoms {
                assert_eq!(
                    may_connect(a, b),
                    may_connect(b, a),
                    "asymmetric for {a:?} / {b:?}"
                );
            }
        }
    }
}
