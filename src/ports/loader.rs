//! Fragment-file loader for V2000-style records with synthesis appendices.
//!
//! A fragment file holds one or more records separated by `$$$$`. Each
//! record is a structure block (header lines, a counts line tagged `V2000`,
//! atom lines, bond lines, `M  END`) followed by tagged data blocks:
//!
//! * `> <connections>` (linkers only): one `max-connect atom-type` pair per
//!   atom, so `2 C.3` is a stub taking up to two external bonds and `0 C.3`
//!   a plain atom.
//! * `> <atomtypes>` (rigids only): the full atom type of every atom.
//! * `> <branches>` (rigids only, optional): one line per connection stub,
//!   the 1-based atom number followed by the allow-list of partner types.
//! * `> <descriptors>` (optional): `MW HBD HBA1 logP` for the whole record.
//!
//! File names decide the fragment kind: names starting with `l` are linkers
//! and names starting with `r` are rigids; anything else is rejected.

use crate::core::atom::{AtomType, Element};
use crate::core::bond::{Bond, BondOrder};
use crate::errors::SynthesisError;
use crate::fragment::{Descriptors, FragmentKind, FragmentRecord, RecordAtom};
use crate::ports::FragmentLoader;
use std::collections::VecDeque;
use std::path::Path;

/// Loader that drains fragment records from a list of files.
#[derive(Debug)]
pub struct SdfFragmentLoader {
    pending: VecDeque<PendingRecord>,
}

#[derive(Debug)]
struct PendingRecord {
    kind: FragmentKind,
    name: String,
    body: String,
}

impl SdfFragmentLoader {
    /// Reads all listed files and queues their records for parsing.
    ///
    /// # Errors
    ///
    /// [`SynthesisError::InputMalformed`] when a file cannot be read or its
    /// name does not announce a fragment kind.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SynthesisError> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let contents = std::fs::read_to_string(path).map_err(|err| {
                SynthesisError::InputMalformed(format!(
                    "cannot read fragment file {}: {err}",
                    path.display()
                ))
            })?;
            sources.push((name, contents));
        }
        Self::from_sources(sources)
    }

    /// Queues records from already-loaded `(file name, contents)` pairs.
    ///
    /// # Errors
    ///
    /// [`SynthesisError::InputMalformed`] when a file name does not start
    /// with `l` or `r`.
    pub fn from_sources(sources: Vec<(String, String)>) -> Result<Self, SynthesisError> {
        let mut pending = VecDeque::new();
        for (name, contents) in sources {
            let kind = kind_for_name(&name)?;
            for (ordinal, body) in split_records(&contents).into_iter().enumerate() {
                let record_name = if ordinal == 0 {
                    name.clone()
                } else {
                    format!("{name}#{}", ordinal + 1)
                };
                pending.push_back(PendingRecord {
                    kind,
                    name: record_name,
                    body,
                });
            }
        }
        Ok(Self { pending })
    }
}

impl FragmentLoader for SdfFragmentLoader {
    fn next_fragment(&mut self) -> Result<Option<FragmentRecord>, SynthesisError> {
        let Some(record) = self.pending.pop_front() else {
            return Ok(None);
        };
        parse_record(record.kind, &record.name, &record.body).map(Some)
    }
}

fn kind_for_name(name: &str) -> Result<FragmentKind, SynthesisError> {
    match name.chars().next() {
        Some('l') => Ok(FragmentKind::Linker),
        Some('r') => Ok(FragmentKind::Rigid),
        _ => Err(SynthesisError::InputMalformed(format!(
            "fragment file {name:?} must start with 'l' (linker) or 'r' (rigid)"
        ))),
    }
}

fn split_records(contents: &str) -> Vec<String> {
    contents
        .split("$$$$")
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .map(str::to_string)
        .collect()
}

fn malformed(name: &str, message: impl std::fmt::Display) -> SynthesisError {
    SynthesisError::InputMalformed(format!("fragment {name:?}: {message}"))
}

fn parse_record(
    kind: FragmentKind,
    name: &str,
    body: &str,
) -> Result<FragmentRecord, SynthesisError> {
    let lines: Vec<&str> = body.lines().collect();

    let counts_index = lines
        .iter()
        .position(|line| line.contains("V2000"))
        .ok_or_else(|| malformed(name, "missing V2000 counts line"))?;

    let mut counts = lines[counts_index].split_whitespace();
    let num_atoms: usize = counts
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| malformed(name, "unreadable atom count"))?;
    let num_bonds: usize = counts
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| malformed(name, "unreadable bond count"))?;

    if lines.len() < counts_index + 1 + num_atoms + num_bonds {
        return Err(malformed(name, "structure block shorter than its counts"));
    }

    // The molfile atom lines carry only bare elements; the full atom types
    // come from the appendix blocks below.
    let mut elements = Vec::with_capacity(num_atoms);
    for line in &lines[counts_index + 1..counts_index + 1 + num_atoms] {
        let symbol = line
            .split_whitespace()
            .nth(3)
            .ok_or_else(|| malformed(name, format!("truncated atom line {line:?}")))?;
        let element: Element = symbol
            .parse()
            .map_err(|err| malformed(name, format!("atom line {line:?}: {err}")))?;
        elements.push(element);
    }

    let bond_lines = &lines[counts_index + 1 + num_atoms..counts_index + 1 + num_atoms + num_bonds];
    let mut bonds = Vec::with_capacity(num_bonds);
    for line in bond_lines {
        let mut tokens = line.split_whitespace();
        let origin: usize = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| malformed(name, format!("unreadable bond line {line:?}")))?;
        let target: usize = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| malformed(name, format!("unreadable bond line {line:?}")))?;
        let order: u8 = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| malformed(name, format!("unreadable bond line {line:?}")))?;

        if origin == 0 || target == 0 || origin > num_atoms || target > num_atoms {
            return Err(malformed(
                name,
                format!("bond line {line:?} references a missing atom"),
            ));
        }
        let order = BondOrder::from_order(order)
            .ok_or_else(|| malformed(name, format!("bond order {order} outside 1..=3")))?;
        bonds.push(Bond::new(origin - 1, target - 1, order));
    }

    let blocks = collect_blocks(&lines[counts_index + 1 + num_atoms + num_bonds..]);

    let descriptors = match blocks.iter().find(|(tag, _)| tag == "descriptors") {
        Some((_, lines)) => Some(parse_descriptors(name, lines)?),
        None => None,
    };

    let atoms = match kind {
        FragmentKind::Linker => parse_linker_atoms(name, num_atoms, &blocks)?,
        FragmentKind::Rigid => parse_rigid_atoms(name, num_atoms, &blocks)?,
    };
    debug_assert_eq!(atoms.len(), elements.len());

    Ok(FragmentRecord {
        kind,
        name: record_title(&lines, name),
        atoms,
        bonds,
        descriptors,
    })
}

/// Uses the first header line as the record name when it is non-empty.
fn record_title(lines: &[&str], fallback: &str) -> String {
    match lines.first().map(|line| line.trim()) {
        Some(title) if !title.is_empty() && !title.contains("V2000") => title.to_string(),
        _ => fallback.to_string(),
    }
}

/// Gathers `> <tag>` data blocks into `(tag, lines)` pairs.
fn collect_blocks<'a>(lines: &[&'a str]) -> Vec<(String, Vec<&'a str>)> {
    let mut blocks: Vec<(String, Vec<&'a str>)> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            let tag = trimmed
                .find('<')
                .and_then(|start| {
                    trimmed[start + 1..]
                        .find('>')
                        .map(|end| trimmed[start + 1..start + 1 + end].to_ascii_lowercase())
                })
                .unwrap_or_default();
            blocks.push((tag, Vec::new()));
        } else if trimmed == "M  END" || trimmed == "M END" || trimmed.is_empty() {
            continue;
        } else if let Some((_, block)) = blocks.last_mut() {
            block.push(trimmed);
        }
    }
    blocks
}

fn parse_descriptors(name: &str, lines: &[&str]) -> Result<Descriptors, SynthesisError> {
    let tokens: Vec<f64> = lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(|token| {
            token
                .parse()
                .map_err(|_| malformed(name, format!("unreadable descriptor value {token:?}")))
        })
        .collect::<Result<_, _>>()?;

    if tokens.len() != 4 {
        return Err(malformed(
            name,
            format!("descriptor block needs 4 values, found {}", tokens.len()),
        ));
    }

    Ok(Descriptors {
        mol_wt: tokens[0],
        hbd: tokens[1],
        hba1: tokens[2],
        log_p: tokens[3],
    })
}

fn parse_atom_type(name: &str, token: &str) -> Result<AtomType, SynthesisError> {
    token
        .parse()
        .map_err(|err| malformed(name, format!("atom type {token:?}: {err}")))
}

fn parse_linker_atoms(
    name: &str,
    num_atoms: usize,
    blocks: &[(String, Vec<&str>)],
) -> Result<Vec<RecordAtom>, SynthesisError> {
    let (_, lines) = blocks
        .iter()
        .find(|(tag, _)| tag == "connections")
        .ok_or_else(|| malformed(name, "linker record missing the connections block"))?;

    let tokens: Vec<&str> = lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .collect();
    if tokens.len() != 2 * num_atoms {
        return Err(malformed(
            name,
            format!(
                "connections block needs {} entries, found {}",
                2 * num_atoms,
                tokens.len() / 2
            ),
        ));
    }

    let mut atoms = Vec::with_capacity(num_atoms);
    for pair in tokens.chunks(2) {
        let max_connect: u8 = pair[0]
            .parse()
            .map_err(|_| malformed(name, format!("unreadable max-connect {:?}", pair[0])))?;
        let atom_type = parse_atom_type(name, pair[1])?;

        atoms.push(if max_connect > 0 {
            RecordAtom::LinkerStub {
                atom_type,
                max_connect,
            }
        } else {
            RecordAtom::Simple { atom_type }
        });
    }
    Ok(atoms)
}

fn parse_rigid_atoms(
    name: &str,
    num_atoms: usize,
    blocks: &[(String, Vec<&str>)],
) -> Result<Vec<RecordAtom>, SynthesisError> {
    let (_, type_lines) = blocks
        .iter()
        .find(|(tag, _)| tag == "atomtypes")
        .ok_or_else(|| malformed(name, "rigid record missing the atomtypes block"))?;

    let types: Vec<AtomType> = type_lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(|token| parse_atom_type(name, token))
        .collect::<Result<_, _>>()?;
    if types.len() != num_atoms {
        return Err(malformed(
            name,
            format!(
                "atomtypes block needs {num_atoms} entries, found {}",
                types.len()
            ),
        ));
    }

    let mut allow_lists: Vec<Vec<AtomType>> = vec![Vec::new(); num_atoms];
    if let Some((_, branch_lines)) = blocks.iter().find(|(tag, _)| tag == "branches") {
        for line in branch_lines {
            let mut tokens = line.split_whitespace();
            let atom: usize = tokens
                .next()
                .and_then(|token| token.parse().ok())
                .ok_or_else(|| malformed(name, format!("unreadable branch line {line:?}")))?;
            if atom == 0 || atom > num_atoms {
                return Err(malformed(
                    name,
                    format!("branch line {line:?} references a missing atom"),
                ));
            }
            for token in tokens {
                allow_lists[atom - 1].push(parse_atom_type(name, token)?);
            }
        }
    }

    Ok(types
        .into_iter()
        .zip(allow_lists)
        .map(|(atom_type, allowed)| {
            if allowed.is_empty() {
                RecordAtom::Simple { atom_type }
            } else {
                RecordAtom::RigidStub { atom_type, allowed }
            }
        })
        .collect())
}
