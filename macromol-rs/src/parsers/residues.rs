use crate::parsers::line::AtomLine;

/// Iterates over the residues formed by a selection of atoms. Consecutive
/// atoms from the same residue form one residue.
pub struct ResidueIterator<'a> {
    atoms: &'a [AtomLine],
    selection: &'a [usize],
    position: usize,
}

impl<'a> ResidueIterator<'a> {
    /// `selection` contains indices in `atoms`.
    pub fn new(atoms: &'a [AtomLine], selection: &'a [usize]) -> Self {
        ResidueIterator {
            atoms,
            selection,
            position: 0,
        }
    }
}

impl<'a> Iterator for ResidueIterator<'a> {
    type Item = ResidueView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.position;
        let first = &self.atoms[*self.selection.get(start)?];
        let mut end = start + 1;
        while end < self.selection.len() && self.atoms[self.selection[end]].same_residue(first) {
            end += 1;
        }
        self.position = end;
        Some(ResidueView {
            atoms: self.atoms,
            selection: &self.selection[start..end],
        })
    }
}

pub struct ResidueView<'a> {
    atoms: &'a [AtomLine],
    selection: &'a [usize],
}

impl<'a> ResidueView<'a> {
    fn first(&self) -> &'a AtomLine {
        // A view is never built empty.
        &self.atoms[self.selection[0]]
    }

    pub fn iter_atoms(&self) -> impl Iterator<Item = &'a AtomLine> {
        let atoms = self.atoms;
        self.selection.iter().map(move |&index| &atoms[index])
    }

    pub fn find_atom(&self, name: &str) -> Option<&'a AtomLine> {
        self.iter_atoms()
            .find(|atom| atom.atom_name.trim() == name.trim())
    }

    pub fn name(&self) -> &'a str {
        &self.first().residue_type
    }

    pub fn pdb_residue_number(&self) -> isize {
        self.first().pdb_residue_number
    }

    pub fn insertion_code(&self) -> Option<char> {
        self.first().insertion_code
    }

    /// Position in the declared sequence of the chain, when the file gives one.
    pub fn sequence_index(&self) -> Option<isize> {
        self.first().sequence_index
    }

    pub fn is_het_atm(&self) -> bool {
        self.iter_atoms().all(|atom| atom.is_het_atm)
    }

    pub fn atom_count(&self) -> usize {
        self.selection.len()
    }
}
