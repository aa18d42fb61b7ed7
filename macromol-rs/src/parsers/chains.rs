use crate::parsers::errors::{FormatError, ReadError};
use crate::parsers::line::AtomLine;
use crate::parsers::residues::{ResidueIterator, ResidueView};
use crate::parsers::StructureDocument;
use components::{is_backbone_het_residue, is_polymer_residue};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// How atoms are split into chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartitionStrategy {
    /// The file has TER records: a chain ends when the author chain code
    /// changes or after a TER record.
    Terminated,
    /// The file has no TER records: in addition, a HETATM residue that is not
    /// linked to the peptide backbone starts a new chain.
    Unterminated,
    /// The file gives internal chain codes that we keep.
    Labelled,
}

impl PartitionStrategy {
    pub fn for_author_chains(has_terminators: bool) -> Self {
        if has_terminators {
            PartitionStrategy::Terminated
        } else {
            PartitionStrategy::Unterminated
        }
    }
}

pub const FIRST_CHAIN_CODE: &str = "A";

/// Chain code that follows the given one.
///
/// The first letter changes the fastest: `Z` is followed by `AA`, `ZA` by `AB`,
/// and `ZZ` by `AAA`.
pub fn next_chain_code(code: &str) -> String {
    let mut letters: Vec<char> = code.chars().collect();
    for letter in letters.iter_mut() {
        if *letter == 'Z' {
            *letter = 'A';
        } else {
            *letter = char::from_u32(*letter as u32 + 1).unwrap_or('A');
            return letters.into_iter().collect();
        }
    }
    letters.push('A');
    letters.into_iter().collect()
}

/// Heuristic used when the file has no TER records: is a HETATM residue
/// part of a peptide chain?
///
/// A residue is considered linked when it is a known modified amino acid or
/// a capping group, or when it has the backbone atoms C, N, and CA. This
/// misses polymers that start with an unusual HETATM residue.
pub fn looks_peptide_linked(residue: &ResidueView) -> bool {
    is_backbone_het_residue(residue.name())
        || ["C", "N", "CA"]
            .iter()
            .all(|name| residue.find_atom(name).is_some())
}

/// A group of atoms that form a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainGroup {
    pub chain_code: String,
    pub pdb_chain_code: String,
    pub is_non_poly: bool,
    /// Indices of the atoms in the document, in file order.
    atoms: Vec<usize>,
    /// The subset of `atoms` at the selected alternate location.
    located: Vec<usize>,
}

impl ChainGroup {
    fn new(chain_code: String, pdb_chain_code: String) -> Self {
        ChainGroup {
            chain_code,
            pdb_chain_code,
            is_non_poly: true,
            atoms: Vec::new(),
            located: Vec::new(),
        }
    }

    /// All the atoms of the group, at every alternate location.
    pub fn atom_indices(&self) -> &[usize] {
        &self.atoms
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// The atoms without an alternate location, and those at `alt_loc`.
    pub fn located_atom_indices(&self) -> &[usize] {
        &self.located
    }

    pub(crate) fn select_location(&mut self, atoms: &[AtomLine], alt_loc: &str) {
        self.located = self
            .atoms
            .iter()
            .copied()
            .filter(|&index| atoms[index].is_at_location(alt_loc))
            .collect();
    }
}

/// The result of splitting atoms into chains.
#[derive(Debug, Default)]
pub struct Partition {
    /// Groups in the order they first appear in the file.
    pub groups: IndexMap<String, ChainGroup>,
    /// Author chain code to internal chain code, for polymer chains.
    pub pdb_chain_to_chain: BTreeMap<String, String>,
}

pub struct ChainPartitioner {
    strategy: PartitionStrategy,
}

impl ChainPartitioner {
    pub fn new(strategy: PartitionStrategy) -> Self {
        ChainPartitioner { strategy }
    }

    /// Split the atoms into chains.
    ///
    /// The atoms get their internal chain code (unless the file gave it) and
    /// their polymer flag; they are not reordered.
    pub fn partition(&self, atoms: &mut [AtomLine]) -> Result<Partition, ReadError> {
        let mut partition = Partition::default();
        match self.strategy {
            PartitionStrategy::Labelled => self.group_by_label(atoms, &mut partition),
            PartitionStrategy::Terminated | PartitionStrategy::Unterminated => {
                self.group_by_author_chain(atoms, &mut partition)
            }
        }
        debug!(
            "Split {} atoms into {} chains ({:?}).",
            atoms.len(),
            partition.groups.len(),
            self.strategy
        );

        check_serials(atoms, &partition)?;
        classify(atoms, &mut partition)?;
        Ok(partition)
    }

    fn group_by_label(&self, atoms: &[AtomLine], partition: &mut Partition) {
        for (index, atom) in atoms.iter().enumerate() {
            let chain_code = atom
                .chain_code
                .clone()
                .unwrap_or_else(|| atom.pdb_chain_code.clone());
            partition
                .groups
                .entry(chain_code.clone())
                .or_insert_with(|| ChainGroup::new(chain_code, atom.pdb_chain_code.clone()))
                .atoms
                .push(index);
        }
    }

    fn group_by_author_chain(&self, atoms: &mut [AtomLine], partition: &mut Partition) {
        let splits_on_het = self.strategy == PartitionStrategy::Unterminated;
        if splits_on_het {
            warn!("No TER record in the file: chains are guessed from HETATM records.");
        }
        let peptide_linked = if splits_on_het {
            peptide_linked_atoms(atoms)
        } else {
            Vec::new()
        };

        let mut chain_code = String::new();
        let mut last: Option<(String, bool, bool)> = None;
        for (index, atom) in atoms.iter_mut().enumerate() {
            let starts_chain = match &last {
                None => true,
                Some((last_pdb_chain_code, last_out_of_poly_chain, last_is_het_atm)) => {
                    *last_pdb_chain_code != atom.pdb_chain_code
                        || (!last_out_of_poly_chain && atom.out_of_poly_chain)
                        || (splits_on_het
                            && !last_is_het_atm
                            && atom.is_het_atm
                            && !peptide_linked[index])
                }
            };
            if starts_chain {
                chain_code = if partition.groups.is_empty() {
                    FIRST_CHAIN_CODE.to_owned()
                } else {
                    next_chain_code(&chain_code)
                };
                partition.groups.insert(
                    chain_code.clone(),
                    ChainGroup::new(chain_code.clone(), atom.pdb_chain_code.clone()),
                );
            }
            if let Some(group) = partition.groups.get_mut(&chain_code) {
                group.atoms.push(index);
            }
            atom.chain_code = Some(chain_code.clone());
            last = Some((
                atom.pdb_chain_code.clone(),
                atom.out_of_poly_chain,
                atom.is_het_atm,
            ));
        }
    }
}

/// For each atom, is its residue linked to the peptide backbone?
fn peptide_linked_atoms(atoms: &[AtomLine]) -> Vec<bool> {
    let selection: Vec<usize> = (0..atoms.len()).collect();
    let mut linked = Vec::with_capacity(atoms.len());
    for residue in ResidueIterator::new(atoms, &selection) {
        let is_linked = looks_peptide_linked(&residue);
        linked.extend(std::iter::repeat(is_linked).take(residue.atom_count()));
    }
    linked
}

fn check_serials(atoms: &[AtomLine], partition: &Partition) -> Result<(), ReadError> {
    for group in partition.groups.values() {
        for pair in group.atoms.windows(2) {
            let previous = atoms[pair[0]].serial;
            let serial = atoms[pair[1]].serial;
            if serial <= previous {
                return Err(ReadError::at_document(FormatError::AtomSerialsNotAscending {
                    chain_code: group.chain_code.clone(),
                    previous,
                    serial,
                }));
            }
        }
    }
    Ok(())
}

/// Flag polymer and non-polymer chains and map the author chain codes of the
/// polymers to the internal ones.
fn classify(atoms: &mut [AtomLine], partition: &mut Partition) -> Result<(), ReadError> {
    for group in partition.groups.values_mut() {
        let is_polymer = group.atoms.iter().any(|&index| {
            let atom = &atoms[index];
            !atom.is_het_atm && is_polymer_residue(&atom.residue_type)
        });
        group.is_non_poly = !is_polymer;
        for &index in &group.atoms {
            atoms[index].is_non_poly = group.is_non_poly;
        }
        if group.is_non_poly {
            continue;
        }
        if let Some(first) = partition.pdb_chain_to_chain.get(&group.pdb_chain_code) {
            return Err(ReadError::at_document(FormatError::PolymerChainAssignedTwice {
                pdb_chain_code: group.pdb_chain_code.clone(),
                first: first.clone(),
                second: group.chain_code.clone(),
            }));
        }
        partition
            .pdb_chain_to_chain
            .insert(group.pdb_chain_code.clone(), group.chain_code.clone());
    }
    Ok(())
}

/// A chain of a document.
///
/// Atoms at alternate locations other than the one selected for the document
/// are left out.
#[derive(Debug)]
pub struct ChainView<'a> {
    document: &'a StructureDocument,
    group: &'a ChainGroup,
}

impl<'a> ChainView<'a> {
    pub fn new(document: &'a StructureDocument, group: &'a ChainGroup) -> Self {
        ChainView { document, group }
    }

    pub fn chain_code(&self) -> &'a str {
        &self.group.chain_code
    }

    pub fn pdb_chain_code(&self) -> &'a str {
        &self.group.pdb_chain_code
    }

    pub fn is_non_poly(&self) -> bool {
        self.group.is_non_poly
    }

    pub fn atom_count(&self) -> usize {
        self.group.located.len()
    }

    pub fn iter_atoms(&self) -> impl Iterator<Item = &'a AtomLine> {
        let atoms = self.document.atoms();
        self.group.located.iter().map(move |&index| &atoms[index])
    }

    pub fn iter_residues(&self) -> ResidueIterator<'a> {
        ResidueIterator::new(self.document.atoms(), &self.group.located)
    }
}
