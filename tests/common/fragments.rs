//! Builders and capture helpers shared by the end-to-end scenarios.

use parking_lot::Mutex;
use std::sync::Arc;
use wohler::{
    AtomType, Bond, BondOrder, ChemOracle, Descriptors, Element, Enumerator, FragmentKind,
    FragmentLibrary, FragmentRecord, Molecule, RecordAtom, RunReport, SignatureOracle, Sink,
    SynthesisConfig,
};

pub fn atom_type(element: Element) -> AtomType {
    AtomType::bare(element)
}

pub fn light_descriptors() -> Descriptors {
    Descriptors {
        mol_wt: 40.0,
        hbd: 0.0,
        hba1: 1.0,
        log_p: 0.4,
    }
}

/// A linker with a single connection stub of the given fan-out.
pub fn linker(name: &str, element: Element, max_connect: u8) -> FragmentRecord {
    FragmentRecord {
        kind: FragmentKind::Linker,
        name: name.to_string(),
        atoms: vec![RecordAtom::LinkerStub {
            atom_type: atom_type(element),
            max_connect,
        }],
        bonds: Vec::new(),
        descriptors: Some(light_descriptors()),
    }
}

/// A rigid with a single allow-listed connection stub.
pub fn rigid(name: &str, element: Element, allowed: &[Element]) -> FragmentRecord {
    FragmentRecord {
        kind: FragmentKind::Rigid,
        name: name.to_string(),
        atoms: vec![RecordAtom::RigidStub {
            atom_type: atom_type(element),
            allowed: allowed.iter().copied().map(atom_type).collect(),
        }],
        bonds: Vec::new(),
        descriptors: Some(light_descriptors()),
    }
}

/// A rigid with two bonded connection stubs sharing one allow-list.
pub fn two_stub_rigid(name: &str, element: Element, allowed: &[Element]) -> FragmentRecord {
    let allowed: Vec<AtomType> = allowed.iter().copied().map(atom_type).collect();
    FragmentRecord {
        kind: FragmentKind::Rigid,
        name: name.to_string(),
        atoms: vec![
            RecordAtom::RigidStub {
                atom_type: atom_type(element),
                allowed: allowed.clone(),
            },
            RecordAtom::RigidStub {
                atom_type: atom_type(element),
                allowed,
            },
        ],
        bonds: vec![Bond::new(0, 1, BondOrder::Single)],
        descriptors: Some(light_descriptors()),
    }
}

/// A configuration small enough for exhaustive scenario runs: tiny filter
/// populations and the rarity sampler pushed out of range.
pub fn scenario_config(level_bound: usize) -> SynthesisConfig {
    let mut config = SynthesisConfig::default();
    config.level_bound = level_bound;
    config.level_populations = Some(vec![1_000; level_bound + 1]);
    config.rarity_start_level = level_bound + 1;
    config
}

/// Sink that keeps every emission, molecule included, for invariant checks.
#[derive(Default)]
pub struct RecordingSink {
    emissions: Arc<Mutex<Vec<(String, Molecule)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emissions(&self) -> Arc<Mutex<Vec<(String, Molecule)>>> {
        Arc::clone(&self.emissions)
    }
}

impl Sink for RecordingSink {
    fn emit(&mut self, identity: &str, molecule: &Molecule) -> Result<(), std::io::Error> {
        self.emissions
            .lock()
            .push((identity.to_string(), molecule.clone()));
        Ok(())
    }
}

/// Runs a scenario and returns the report plus every emission.
pub fn run_scenario(
    records: Vec<FragmentRecord>,
    config: SynthesisConfig,
) -> (RunReport, Vec<(String, Molecule)>) {
    let oracle = SignatureOracle::new();
    let library = FragmentLibrary::from_records(records, &oracle).expect("library builds");

    let sink = RecordingSink::new();
    let emissions = sink.emissions();
    let report = Enumerator::new(library, config, Box::new(oracle), Box::new(sink))
        .run()
        .expect("run succeeds");

    let emissions = emissions.lock().clone();
    (report, emissions)
}

/// Identity strings of all emissions, in emission order.
pub fn identities(emissions: &[(String, Molecule)]) -> Vec<String> {
    emissions
        .iter()
        .map(|(identity, _)| identity.clone())
        .collect()
}

/// Canonicalizes through the same oracle the scenarios run with.
pub fn canonical(molecule: &Molecule) -> String {
    SignatureOracle::new()
        .canonicalize(molecule)
        .expect("signature oracle cannot fail")
}
