pub mod atom_lines;
pub mod chains;
pub mod cif;
pub mod document;
pub mod errors;
pub mod line;
pub mod pdb;
pub mod reader;
pub mod records;
pub mod residues;
pub mod schema;
pub mod tokenizer;

/// Cartesian coordinates, in Ångström.
pub type Position = [f64; 3];

pub use cif::CifReader;
pub use document::StructureDocument;
pub use errors::{FormatError, ReadError};
pub use pdb::PdbReader;
pub use reader::{open_structure, read_document, read_structure, ReadOptions, StructureReader};
