use crate::parsers::chains::{ChainGroup, ChainPartitioner, ChainView, PartitionStrategy};
use crate::parsers::errors::{FormatError, ReadError};
use crate::parsers::line::{AtomLine, PolySeqLine, SecStructureLine};
use crate::parsers::reader::ModelRecords;
use crate::parsers::residues::ResidueIterator;
use components::one_letter_code;
use indexmap::IndexMap;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// A model read from a structure file, split into chains.
#[derive(Debug)]
pub struct StructureDocument {
    pdb_code: Option<String>,
    model: i32,
    atoms: Vec<AtomLine>,
    groups: IndexMap<String, ChainGroup>,
    pdb_chain_to_chain: BTreeMap<String, String>,
    poly_seq: Vec<PolySeqLine>,
    sec_structure: Vec<SecStructureLine>,
    alt_loc: String,
    alt_locs: BTreeSet<String>,
    insertion_codes: BTreeMap<String, usize>,
    strategy: PartitionStrategy,
}

impl StructureDocument {
    /// Split the atoms of a model into chains and build the document.
    pub fn assemble(records: ModelRecords, model: i32) -> Result<Self, ReadError> {
        let ModelRecords {
            pdb_code,
            atoms,
            mut poly_seq,
            sec_structure,
            strategy,
        } = records;
        let alt_loc = atoms.default_alt_loc().to_owned();
        let alt_locs = atoms.alt_locs().clone();
        let insertion_codes = atoms.insertion_codes().clone();
        let mut atoms = atoms.into_lines();

        let mut partition = ChainPartitioner::new(strategy).partition(&mut atoms)?;
        for group in partition.groups.values_mut() {
            group.select_location(&atoms, &alt_loc);
        }
        for line in poly_seq.iter_mut().filter(|line| line.chain_code.is_none()) {
            line.chain_code = partition
                .pdb_chain_to_chain
                .get(&line.pdb_chain_code)
                .cloned();
        }
        debug!(
            "Model {model}: {} atoms, {} chains, alternate location '{alt_loc}'.",
            atoms.len(),
            partition.groups.len()
        );

        Ok(StructureDocument {
            pdb_code,
            model,
            atoms,
            groups: partition.groups,
            pdb_chain_to_chain: partition.pdb_chain_to_chain,
            poly_seq,
            sec_structure,
            alt_loc,
            alt_locs,
            insertion_codes,
            strategy,
        })
    }

    /// The 4 character identifier of the entry, in lower case.
    pub fn pdb_code(&self) -> Option<&str> {
        self.pdb_code.as_deref()
    }

    pub fn model(&self) -> i32 {
        self.model
    }

    /// All the atoms of the model, in file order.
    pub fn atoms(&self) -> &[AtomLine] {
        &self.atoms
    }

    /// The atoms without an alternate location, and those at the selected one.
    pub fn atoms_at_default_location(&self) -> impl Iterator<Item = &AtomLine> {
        self.atoms
            .iter()
            .filter(|atom| atom.is_at_location(&self.alt_loc))
    }

    /// The alternate location used when an atom has several.
    pub fn alt_location(&self) -> &str {
        &self.alt_loc
    }

    pub fn alt_locs(&self) -> &BTreeSet<String> {
        &self.alt_locs
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    /// The chain groups, in the order they first appear in the file.
    pub fn chain_groups(&self) -> impl Iterator<Item = &ChainGroup> {
        self.groups.values()
    }

    pub fn chain_group(&self, chain_code: &str) -> Option<&ChainGroup> {
        self.groups.get(chain_code)
    }

    /// The internal chain code of a polymer chain.
    pub fn chain_code_for(&self, pdb_chain_code: &str) -> Option<&str> {
        self.pdb_chain_to_chain
            .get(pdb_chain_code)
            .map(String::as_str)
    }

    pub fn pdb_chain_to_chain(&self) -> &BTreeMap<String, String> {
        &self.pdb_chain_to_chain
    }

    pub fn iter_chains(&self) -> impl Iterator<Item = ChainView<'_>> {
        self.groups
            .values()
            .map(move |group| ChainView::new(self, group))
    }

    pub fn polymer_chains(&self) -> impl Iterator<Item = ChainView<'_>> {
        self.iter_chains().filter(|chain| !chain.is_non_poly())
    }

    pub fn non_polymer_chains(&self) -> impl Iterator<Item = ChainView<'_>> {
        self.iter_chains().filter(|chain| chain.is_non_poly())
    }

    /// The chains with the given author chain code.
    pub fn read_chain(&self, pdb_chain_code: &str) -> Result<Vec<ChainView<'_>>, ReadError> {
        let chains: Vec<ChainView> = self
            .iter_chains()
            .filter(|chain| chain.pdb_chain_code() == pdb_chain_code)
            .collect();
        if chains.is_empty() {
            return Err(ReadError::ChainNotFound {
                chain: Some(pdb_chain_code.to_owned()),
                model: self.model,
            });
        }
        Ok(chains)
    }

    pub fn poly_seq(&self) -> &[PolySeqLine] {
        &self.poly_seq
    }

    pub fn sec_structure(&self) -> &[SecStructureLine] {
        &self.sec_structure
    }

    /// Number of residues with an insertion code, per author chain code.
    pub fn insertion_codes(&self) -> &BTreeMap<String, usize> {
        &self.insertion_codes
    }

    fn residue_codes(&self, group: &ChainGroup, include_het_atm: bool) -> Vec<char> {
        ResidueIterator::new(&self.atoms, group.located_atom_indices())
            .filter(|residue| include_het_atm || !residue.is_het_atm())
            .map(|residue| one_letter_code(residue.name()))
            .collect()
    }

    /// One letter sequence of the residues observed in a chain group.
    pub fn sequence(&self, chain_code: &str) -> Option<String> {
        let group = self.groups.get(chain_code)?;
        Some(self.residue_codes(group, true).into_iter().collect())
    }

    /// One letter sequence of a chain as declared in the file.
    pub fn declared_sequence(&self, pdb_chain_code: &str) -> String {
        self.poly_seq
            .iter()
            .filter(|line| line.pdb_chain_code == pdb_chain_code)
            .map(|line| one_letter_code(&line.residue_type))
            .collect()
    }

    /// Check the residues observed in each polymer chain against the declared
    /// sequence of that chain.
    ///
    /// mmCIF residues carry their position in the sequence, so each one must
    /// match the declared residue at that position. PDB residues only have to
    /// appear in order in the SEQRES sequence, HETATM residues aside.
    /// Chains without a declared sequence are not checked.
    pub fn check_sequences(&self) -> Result<(), ReadError> {
        match self.strategy {
            PartitionStrategy::Labelled => self.check_indexed_sequences(),
            PartitionStrategy::Terminated | PartitionStrategy::Unterminated => {
                self.check_ordered_sequences()
            }
        }
    }

    fn check_ordered_sequences(&self) -> Result<(), ReadError> {
        for group in self.groups.values().filter(|group| !group.is_non_poly) {
            let declared: Vec<char> = self.declared_sequence(&group.pdb_chain_code).chars().collect();
            if declared.is_empty() {
                continue;
            }
            let observed = self.residue_codes(group, false);
            if !is_subsequence(&observed, &declared) {
                return Err(ReadError::at_document(FormatError::SequenceMismatch {
                    pdb_chain_code: group.pdb_chain_code.clone(),
                }));
            }
        }
        Ok(())
    }

    fn check_indexed_sequences(&self) -> Result<(), ReadError> {
        for group in self.groups.values().filter(|group| !group.is_non_poly) {
            let declared: BTreeMap<isize, char> = self
                .poly_seq
                .iter()
                .filter(|line| line.chain_code.as_deref() == Some(group.chain_code.as_str()))
                .map(|line| (line.sequence_index, one_letter_code(&line.residue_type)))
                .collect();
            if declared.is_empty() {
                continue;
            }
            let residues: Vec<_> = ResidueIterator::new(&self.atoms, group.located_atom_indices())
                .filter(|residue| residue.sequence_index().is_some())
                .collect();
            if residues.len() > declared.len() {
                return Err(ReadError::at_document(FormatError::ObservedSequenceTooLong {
                    chain_code: group.chain_code.clone(),
                    observed: residues.len(),
                    declared: declared.len(),
                }));
            }
            for residue in residues {
                let Some(sequence_index) = residue.sequence_index() else {
                    continue;
                };
                if declared.get(&sequence_index) != Some(&one_letter_code(residue.name())) {
                    return Err(ReadError::at_document(FormatError::ResidueMismatch {
                        chain_code: group.chain_code.clone(),
                        sequence_index,
                        residue_type: residue.name().to_owned(),
                    }));
                }
            }
        }
        Ok(())
    }
}

fn is_subsequence(observed: &[char], declared: &[char]) -> bool {
    let mut declared = declared.iter();
    observed
        .iter()
        .all(|code| declared.any(|candidate| candidate == code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::atom_lines::tests::atom;
    use crate::parsers::atom_lines::AtomLineList;
    use rstest::{fixture, rstest};

    fn seqres(pdb_chain_code: &str, residues: &[&str]) -> Vec<PolySeqLine> {
        residues
            .iter()
            .enumerate()
            .map(|(index, residue)| PolySeqLine {
                chain_code: None,
                pdb_chain_code: pdb_chain_code.to_owned(),
                sequence_index: index as isize + 1,
                residue_type: (*residue).to_owned(),
                pdb_residue_number: None,
                insertion_code: None,
            })
            .collect()
    }

    fn records(lines: Vec<AtomLine>, poly_seq: Vec<PolySeqLine>) -> ModelRecords {
        let mut atoms = AtomLineList::new();
        for line in lines {
            atoms.push(line);
        }
        atoms.set_has_terminators(true);
        ModelRecords {
            pdb_code: Some(String::from("1abc")),
            atoms,
            poly_seq,
            sec_structure: Vec::new(),
            strategy: PartitionStrategy::Terminated,
        }
    }

    #[fixture]
    fn two_chains() -> StructureDocument {
        let mut ligand = atom(5, "ZN", "ZN", "A", 200, true);
        ligand.out_of_poly_chain = true;
        let mut alternate = atom(3, "CB", "ALA", "A", 2, false);
        alternate.alt_loc = String::from("B");
        let lines = vec![
            atom(1, "N", "GLY", "A", 1, false),
            atom(2, "N", "ALA", "A", 2, false),
            alternate,
            atom(4, "N", "MSE", "A", 3, true),
            ligand,
            atom(6, "N", "TRP", "B", 1, false),
        ];
        let mut poly_seq = seqres("A", &["MET", "GLY", "ALA", "MSE", "LYS"]);
        poly_seq.extend(seqres("B", &["TRP"]));
        StructureDocument::assemble(records(lines, poly_seq), 1).unwrap()
    }

    #[rstest]
    fn test_accessors(two_chains: StructureDocument) {
        assert_eq!(two_chains.pdb_code(), Some("1abc"));
        assert_eq!(two_chains.atoms().len(), 6);
        assert_eq!(two_chains.alt_location(), "B");
        assert_eq!(two_chains.atoms_at_default_location().count(), 6);
        let chain_codes: Vec<&str> = two_chains.iter_chains().map(|chain| chain.chain_code()).collect();
        assert_eq!(chain_codes, vec!["A", "B", "C"]);
        assert_eq!(two_chains.chain_code_for("B"), Some("C"));
        assert_eq!(two_chains.chain_code_for("Z"), None);
        assert_eq!(two_chains.polymer_chains().count(), 2);
        assert_eq!(two_chains.non_polymer_chains().count(), 1);
        assert_eq!(two_chains.poly_seq()[0].chain_code.as_deref(), Some("A"));
    }

    #[rstest]
    fn test_sequences(two_chains: StructureDocument) {
        assert_eq!(two_chains.sequence("A").as_deref(), Some("GAX"));
        assert_eq!(two_chains.sequence("C").as_deref(), Some("W"));
        assert_eq!(two_chains.sequence("Q"), None);
        assert_eq!(two_chains.declared_sequence("A"), "MGAXK");
        assert!(two_chains.check_sequences().is_ok());
    }

    #[rstest]
    fn test_read_chain(two_chains: StructureDocument) {
        let chains = two_chains.read_chain("A").unwrap();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].iter_atoms().count(), 4);
        assert_eq!(chains[0].iter_residues().count(), 3);
        assert!(chains[1].is_non_poly());
        let error = two_chains.read_chain("Z").unwrap_err();
        assert!(matches!(
            error,
            ReadError::ChainNotFound { chain: Some(ref chain), model: 1 } if chain == "Z"
        ));
    }

    #[rstest]
    #[case(&["GLY", "ALA"], true)]
    #[case(&["GLY", "GLY", "ALA", "ALA"], true)]
    #[case(&["ALA", "GLY"], false)]
    #[case(&["GLY"], false)]
    fn test_sequence_mismatch(#[case] declared: &[&str], #[case] consistent: bool) {
        let lines = vec![
            atom(1, "N", "GLY", "A", 1, false),
            atom(2, "N", "ALA", "A", 2, false),
        ];
        let document = StructureDocument::assemble(records(lines, seqres("A", declared)), 1).unwrap();
        let result = document.check_sequences();
        assert_eq!(result.is_ok(), consistent);
        if let Err(error) = result {
            assert_eq!(
                error.format_error(),
                Some(&FormatError::SequenceMismatch {
                    pdb_chain_code: String::from("A")
                })
            );
        }
    }

    fn labelled(residues: &[(&str, isize)], declared: &[&str]) -> StructureDocument {
        let lines = residues
            .iter()
            .enumerate()
            .map(|(index, &(residue_type, sequence_index))| {
                let mut line = atom(index as isize + 1, "N", residue_type, "A", sequence_index, false);
                line.chain_code = Some(String::from("A"));
                line.sequence_index = Some(sequence_index);
                line
            })
            .collect();
        let mut poly_seq = seqres("A", declared);
        for line in poly_seq.iter_mut() {
            line.chain_code = Some(String::from("A"));
        }
        let mut records = records(lines, poly_seq);
        records.strategy = PartitionStrategy::Labelled;
        StructureDocument::assemble(records, 1).unwrap()
    }

    #[rstest]
    #[case(&[("GLY", 2), ("ALA", 3)], &["MET", "GLY", "ALA"], None)]
    #[case(&[("GLY", 1), ("ALA", 2)], &["GLY", "ALA", "SER"], None)]
    #[case(
        &[("GLY", 1), ("ALA", 2)],
        &["ALA", "GLY"],
        Some(FormatError::ResidueMismatch {
            chain_code: String::from("A"),
            sequence_index: 1,
            residue_type: String::from("GLY"),
        })
    )]
    #[case(
        &[("GLY", 1), ("ALA", 2)],
        &["GLY"],
        Some(FormatError::ObservedSequenceTooLong {
            chain_code: String::from("A"),
            observed: 2,
            declared: 1,
        })
    )]
    fn test_indexed_sequence_mismatch(
        #[case] residues: &[(&str, isize)],
        #[case] declared: &[&str],
        #[case] expected: Option<FormatError>,
    ) {
        let document = labelled(residues, declared);
        match expected {
            None => assert!(document.check_sequences().is_ok()),
            Some(expected) => {
                let error = document.check_sequences().unwrap_err();
                assert_eq!(error.format_error(), Some(&expected));
            }
        }
    }

    #[test_log::test]
    fn test_chains_skip_other_alt_locs() {
        let mut first = atom(3, "OG", "SER", "A", 2, false);
        first.alt_loc = String::from("A");
        let mut second = atom(4, "OG", "SER", "A", 2, false);
        second.alt_loc = String::from("B");
        let lines = vec![
            atom(1, "N", "SER", "A", 2, false),
            atom(2, "CA", "SER", "A", 2, false),
            first,
            second,
        ];
        let document = StructureDocument::assemble(records(lines, Vec::new()), 1).unwrap();
        assert_eq!(document.alt_location(), "A");
        assert_eq!(document.atoms().len(), 4);
        assert_eq!(document.chain_group("A").unwrap().atom_count(), 4);

        let chain = document.iter_chains().next().unwrap();
        assert_eq!(chain.atom_count(), 3);
        let serials: Vec<isize> = chain.iter_atoms().map(|atom| atom.serial).collect();
        assert_eq!(serials, vec![1, 2, 3]);
        let residue = chain.iter_residues().next().unwrap();
        assert_eq!(residue.atom_count(), 3);
    }
}
