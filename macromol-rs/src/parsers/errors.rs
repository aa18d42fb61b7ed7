use std::fmt;
use std::io;
use thiserror::Error;

/// When a field is ill-formatted, this enum tells what field has the issue.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FieldError {
    #[error("atom serial")]
    Serial,
    #[error("residue number")]
    ResidueIdentifier,
    #[error("sequence index")]
    SequenceIdentifier,
    #[error("coordinates")]
    Position,
    #[error("occupancy")]
    Occupancy,
    #[error("B-factor")]
    BFactor,
    #[error("model number")]
    Model,
}

/// What went wrong when reading a structure file?
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormatError {
    #[error("the file does not start with a data block header")]
    NotACifFile,
    #[error("cannot parse the {0}")]
    FieldFormat(FieldError),
    #[error("the line is too short")]
    LineTooShort,
    #[error("expected {expected} values in {field}, found {found}")]
    UnexpectedFieldNumber {
        field: String,
        expected: usize,
        found: usize,
    },
    #[error("missing field {0}")]
    MissingField(String),
    #[error("no {0} block in the file")]
    MissingBlock(String),
    #[error("atom serial {serial} is not above {previous} in chain {chain_code}")]
    AtomSerialsNotAscending {
        chain_code: String,
        previous: isize,
        serial: isize,
    },
    #[error("polymer chain {pdb_chain_code} assigned twice: to {first} and to {second}")]
    PolymerChainAssignedTwice {
        pdb_chain_code: String,
        first: String,
        second: String,
    },
    #[error("insertion code {insertion_code} on residue {residue_number} of chain {pdb_chain_code}")]
    InsertionCodesPresent {
        pdb_chain_code: String,
        residue_number: isize,
        insertion_code: char,
    },
    #[error("the residues of chain {pdb_chain_code} do not match its SEQRES sequence")]
    SequenceMismatch { pdb_chain_code: String },
    #[error("chain {chain_code} has {observed} residues but its sequence declares {declared}")]
    ObservedSequenceTooLong {
        chain_code: String,
        observed: usize,
        declared: usize,
    },
    #[error("residue {residue_type} at sequence index {sequence_index} of chain {chain_code} does not match the declared sequence")]
    ResidueMismatch {
        chain_code: String,
        sequence_index: isize,
        residue_type: String,
    },
    #[error("secondary structure element {id} starts on chain {begin} and ends on chain {end}")]
    SecStructureChainMismatch {
        id: String,
        begin: String,
        end: String,
    },
}

/// Where in the file a format error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// 1-based line number.
    Line(usize),
    /// 1-based record number within a data block.
    Record { field: String, record: usize },
    /// The error concerns the document as a whole.
    Document,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(lineno) => write!(f, "line {lineno}"),
            Location::Record { field, record } => write!(f, "record {record} of {field}"),
            Location::Document => write!(f, "document level"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Format error ({1}): {0}")]
    FormatError(FormatError, Location),
    #[error("No atom for chain {} in model {model}", .chain.as_deref().unwrap_or("<any>"))]
    ChainNotFound { chain: Option<String>, model: i32 },
    #[error("Cannot read the file: {0}")]
    IOError(#[from] io::Error),
}

impl ReadError {
    pub fn at_document(error: FormatError) -> Self {
        ReadError::FormatError(error, Location::Document)
    }

    pub fn at_record(error: FormatError, field: &str, record: usize) -> Self {
        ReadError::FormatError(
            error,
            Location::Record {
                field: field.to_owned(),
                record,
            },
        )
    }

    /// The format error, if this is one.
    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            ReadError::FormatError(error, _) => Some(error),
            _ => None,
        }
    }
}
