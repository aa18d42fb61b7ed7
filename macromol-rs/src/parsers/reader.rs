use crate::parsers::atom_lines::AtomLineList;
use crate::parsers::chains::PartitionStrategy;
use crate::parsers::cif::CifReader;
use crate::parsers::document::StructureDocument;
use crate::parsers::errors::{FormatError, ReadError};
use crate::parsers::line::{PolySeqLine, SecStructureLine, DEFAULT_MODEL};
use crate::parsers::pdb::PdbReader;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// How to read a structure file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// The model to read.
    pub model: i32,
    /// Reject files with insertion codes when false.
    pub allow_insertion_codes: bool,
    /// Check the residues of each polymer chain against its declared sequence.
    pub check_sequence: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            model: DEFAULT_MODEL,
            allow_insertion_codes: true,
            check_sequence: true,
        }
    }
}

/// Everything a reader extracts for one model, before splitting into chains.
#[derive(Debug)]
pub struct ModelRecords {
    pub pdb_code: Option<String>,
    pub atoms: AtomLineList,
    pub poly_seq: Vec<PolySeqLine>,
    pub sec_structure: Vec<SecStructureLine>,
    pub strategy: PartitionStrategy,
}

/// Common interface of the mmCIF and PDB readers.
pub trait StructureReader {
    /// The 4 character identifier of the entry, in lower case.
    fn pdb_code(&mut self) -> Result<Option<String>, ReadError>;
    /// The author chain codes, sorted.
    fn chains(&mut self) -> Result<Vec<String>, ReadError>;
    /// The model numbers, sorted.
    fn models(&mut self) -> Result<Vec<i32>, ReadError>;
    fn read_model(&mut self, model: i32) -> Result<ModelRecords, ReadError>;
}

/// Read one model of a structure and split it into chains.
pub fn read_document<R>(reader: &mut R, options: &ReadOptions) -> Result<StructureDocument, ReadError>
where
    R: StructureReader + ?Sized,
{
    let records = reader.read_model(options.model)?;
    if records.atoms.is_empty() {
        return Err(ReadError::ChainNotFound {
            chain: None,
            model: options.model,
        });
    }
    if !options.allow_insertion_codes {
        check_no_insertion_codes(&records.atoms)?;
    }
    let document = StructureDocument::assemble(records, options.model)?;
    if options.check_sequence {
        document.check_sequences()?;
    }
    Ok(document)
}

fn check_no_insertion_codes(atoms: &AtomLineList) -> Result<(), ReadError> {
    let offending = atoms
        .iter()
        .find_map(|atom| atom.insertion_code.map(|code| (atom, code)));
    match offending {
        None => Ok(()),
        Some((atom, insertion_code)) => Err(ReadError::at_document(
            FormatError::InsertionCodesPresent {
                pdb_chain_code: atom.pdb_chain_code.clone(),
                residue_number: atom.pdb_residue_number,
                insertion_code,
            },
        )),
    }
}

/// Open a structure file with the reader matching its content.
///
/// mmCIF files are recognised by their `data_` header; anything else is read
/// as a PDB file.
pub fn open_structure<P>(path: P) -> Result<Box<dyn StructureReader>, ReadError>
where
    P: AsRef<Path>,
{
    let mut input = BufReader::new(File::open(path.as_ref())?);
    let mut header = String::new();
    input.read_line(&mut header)?;
    input.seek(SeekFrom::Start(0))?;
    if header.starts_with("data_") {
        info!("Reading {} as mmCIF.", path.as_ref().display());
        Ok(Box::new(CifReader::new(input)?))
    } else {
        info!("Reading {} as PDB.", path.as_ref().display());
        Ok(Box::new(PdbReader::new(input)))
    }
}

/// Read one model of a structure file.
pub fn read_structure<P>(path: P, options: &ReadOptions) -> Result<StructureDocument, ReadError>
where
    P: AsRef<Path>,
{
    let mut reader = open_structure(path)?;
    read_document(reader.as_mut(), options)
}
