use crate::parsers::Position;

/// Alternate location code of atoms that have a single location.
pub const DEFAULT_ALT_LOC: &str = ".";
/// Author chain code used when the file does not give one.
pub const NULL_CHAIN_CODE: &str = "NULL";
pub const DEFAULT_MODEL: i32 = 1;
pub const DEFAULT_OCCUPANCY: f64 = 1.0;
pub const DEFAULT_B_FACTOR: f64 = 0.0;

/// The parsed fields from an atom record, in either file format.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomLine {
    pub serial: isize,
    pub atom_name: String,
    pub alt_loc: String,
    pub residue_type: String,
    /// Chain code as written by the authors of the file.
    pub pdb_chain_code: String,
    /// Internal chain code. Read from the file for mmCIF, set when
    /// partitioning into chains for PDB files.
    pub chain_code: Option<String>,
    /// Index of the residue in the sequence, mmCIF only.
    pub sequence_index: Option<isize>,
    pub pdb_residue_number: isize,
    pub insertion_code: Option<char>,
    pub position: Position,
    pub occupancy: f64,
    pub b_factor: f64,
    pub element: Option<String>,
    pub is_het_atm: bool,
    pub is_non_poly: bool,
    /// Set while reading when the record follows a TER record.
    pub out_of_poly_chain: bool,
}

impl AtomLine {
    /// Do both records belong to the same residue?
    pub fn same_residue(&self, other: &AtomLine) -> bool {
        self.pdb_chain_code == other.pdb_chain_code
            && self.pdb_residue_number == other.pdb_residue_number
            && self.insertion_code == other.insertion_code
            && self.residue_type == other.residue_type
    }

    pub fn is_at_location(&self, alt_loc: &str) -> bool {
        self.alt_loc == DEFAULT_ALT_LOC || self.alt_loc == alt_loc
    }
}

/// One residue of the sequence of a polymer chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolySeqLine {
    pub chain_code: Option<String>,
    pub pdb_chain_code: String,
    /// 1-based position in the sequence.
    pub sequence_index: isize,
    pub residue_type: String,
    pub pdb_residue_number: Option<isize>,
    pub insertion_code: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecStructureKind {
    Helix,
    Strand,
    Turn,
}

/// How a secondary structure element refers to its first and last residues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResidueRef {
    /// Sequence index of the residue (mmCIF).
    Sequence(isize),
    /// Author numbering (PDB).
    Author {
        number: isize,
        insertion_code: Option<char>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecStructureLine {
    pub kind: SecStructureKind,
    /// Short identifier such as `H1` or `SA2`.
    pub id: String,
    /// Internal chain code for mmCIF, author chain code for PDB.
    pub chain_code: String,
    pub begin: ResidueRef,
    pub end: ResidueRef,
}
