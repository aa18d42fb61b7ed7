use crate::parsers::line::{AtomLine, DEFAULT_ALT_LOC};
use std::collections::{BTreeMap, BTreeSet};

/// The atom records of one model, in file order, with what we learned about
/// them while reading.
#[derive(Debug, Default, Clone)]
pub struct AtomLineList {
    lines: Vec<AtomLine>,
    alt_locs: BTreeSet<String>,
    /// Number of residues with an insertion code, per author chain code.
    insertion_codes: BTreeMap<String, usize>,
    has_terminators: bool,
}

impl AtomLineList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: AtomLine) {
        if line.alt_loc != DEFAULT_ALT_LOC {
            self.alt_locs.insert(line.alt_loc.clone());
        }
        if line.insertion_code.is_some() {
            let new_residue = self
                .lines
                .last()
                .map_or(true, |previous| !previous.same_residue(&line));
            if new_residue {
                *self
                    .insertion_codes
                    .entry(line.pdb_chain_code.clone())
                    .or_default() += 1;
            }
        }
        self.lines.push(line);
    }

    /// Register alternate location codes declared outside of the atom records.
    pub fn add_alt_locs<I>(&mut self, codes: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.alt_locs.extend(
            codes
                .into_iter()
                .filter(|code| code != DEFAULT_ALT_LOC && code != "?"),
        );
    }

    pub fn set_has_terminators(&mut self, has_terminators: bool) {
        self.has_terminators = has_terminators;
    }

    /// Did the file mark the end of polymer chains?
    pub fn has_terminators(&self) -> bool {
        self.has_terminators
    }

    pub fn alt_locs(&self) -> &BTreeSet<String> {
        &self.alt_locs
    }

    /// The location to use for atoms with alternate locations: the first one in
    /// alphabetical order, or the default code if no atom has alternate locations.
    pub fn default_alt_loc(&self) -> &str {
        self.alt_locs
            .first()
            .map_or(DEFAULT_ALT_LOC, String::as_str)
    }

    pub fn insertion_codes(&self) -> &BTreeMap<String, usize> {
        &self.insertion_codes
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtomLine> {
        self.lines.iter()
    }

    pub fn into_lines(self) -> Vec<AtomLine> {
        self.lines
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parsers::line::DEFAULT_B_FACTOR;
    use crate::parsers::line::DEFAULT_OCCUPANCY;
    use rstest::rstest;

    /// Build an atom record with the fields that matter when grouping atoms.
    pub(crate) fn atom(
        serial: isize,
        atom_name: &str,
        residue_type: &str,
        pdb_chain_code: &str,
        residue_number: isize,
        is_het_atm: bool,
    ) -> AtomLine {
        AtomLine {
            serial,
            atom_name: atom_name.to_owned(),
            alt_loc: DEFAULT_ALT_LOC.to_owned(),
            residue_type: residue_type.to_owned(),
            pdb_chain_code: pdb_chain_code.to_owned(),
            chain_code: None,
            sequence_index: None,
            pdb_residue_number: residue_number,
            insertion_code: None,
            position: [0.0, 0.0, 0.0],
            occupancy: DEFAULT_OCCUPANCY,
            b_factor: DEFAULT_B_FACTOR,
            element: None,
            is_het_atm,
            is_non_poly: false,
            out_of_poly_chain: false,
        }
    }

    fn with_alt_loc(alt_loc: &str) -> AtomLine {
        let mut line = atom(1, "CA", "ALA", "A", 1, false);
        line.alt_loc = alt_loc.to_owned();
        line
    }

    #[rstest]
    #[case(&["B", "A", "C"], "A")]
    #[case(&[".", "."], ".")]
    #[case(&[".", "B", ".", "C"], "B")]
    fn test_default_alt_loc(#[case] observed: &[&str], #[case] expected: &str) {
        let mut list = AtomLineList::new();
        for alt_loc in observed {
            list.push(with_alt_loc(alt_loc));
        }
        assert_eq!(list.default_alt_loc(), expected);
    }

    #[test]
    fn test_declared_alt_locs() {
        let mut list = AtomLineList::new();
        list.push(with_alt_loc("C"));
        list.add_alt_locs(vec![String::from("."), String::from("B")]);
        assert_eq!(list.default_alt_loc(), "B");
        assert_eq!(list.alt_locs().len(), 2);
    }

    #[test]
    fn test_insertion_code_count() {
        let mut list = AtomLineList::new();
        let mut first = atom(1, "N", "GLY", "A", 52, false);
        first.insertion_code = Some('A');
        let mut second = first.clone();
        second.serial = 2;
        second.atom_name = String::from("CA");
        let mut third = atom(3, "N", "SER", "A", 52, false);
        third.insertion_code = Some('B');
        list.push(first);
        list.push(second);
        list.push(third);
        list.push(atom(4, "N", "SER", "B", 1, false));
        assert_eq!(list.insertion_codes().get("A"), Some(&2));
        assert_eq!(list.insertion_codes().get("B"), None);
        assert_eq!(list.len(), 4);
    }
}
