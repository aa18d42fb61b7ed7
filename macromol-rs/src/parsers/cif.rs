use crate::parsers::atom_lines::AtomLineList;
use crate::parsers::chains::PartitionStrategy;
use crate::parsers::errors::*;
use crate::parsers::line::*;
use crate::parsers::reader::{ModelRecords, StructureReader};
use crate::parsers::records::{Records, Row};
use crate::parsers::schema::{FieldId, FieldSchemaRegistry};
use crate::parsers::tokenizer::CifCursor;
use components::is_water;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

/// The state shared by every read of a mmCIF document: the cursor in the
/// file and the index built when opening it.
pub struct ParseContext<R> {
    cursor: CifCursor<R>,
    registry: FieldSchemaRegistry,
}

impl<R> ParseContext<R>
where
    R: BufRead + Seek,
{
    pub fn new(input: R) -> Result<Self, ReadError> {
        let mut cursor = CifCursor::new(input);
        let registry = FieldSchemaRegistry::scan(&mut cursor)?;
        Ok(ParseContext { cursor, registry })
    }

    pub fn registry(&self) -> &FieldSchemaRegistry {
        &self.registry
    }

    /// Iterate over the records of a category, from the first one.
    ///
    /// Returns `None` if the file does not have the category.
    pub fn records(&mut self, field: FieldId) -> Option<Records<'_, '_, R>> {
        let ParseContext { cursor, registry } = self;
        registry
            .get(field)
            .map(move |entry| Records::new(cursor, entry))
    }

    /// Collect one value from every record of a category.
    fn collect_column<T, F>(&mut self, field: FieldId, mut extract: F) -> Result<Vec<T>, ReadError>
    where
        F: FnMut(&Row) -> Result<Option<T>, ReadError>,
    {
        let mut values = Vec::new();
        let Some(records) = self.records(field) else {
            return Ok(values);
        };
        for row in records {
            if let Some(value) = extract(&row?)? {
                values.push(value);
            }
        }
        Ok(values)
    }
}

pub struct CifReader<R> {
    context: ParseContext<R>,
}

impl CifReader<BufReader<File>> {
    pub fn open<P>(path: P) -> Result<Self, ReadError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        CifReader::new(BufReader::new(file))
    }
}

impl<R> CifReader<R>
where
    R: BufRead + Seek,
{
    /// Index the document. Fails if the input is not a mmCIF document.
    pub fn new(input: R) -> Result<Self, ReadError> {
        Ok(CifReader {
            context: ParseContext::new(input)?,
        })
    }

    pub fn context(&self) -> &ParseContext<R> {
        &self.context
    }

    /// The alternate location codes declared in the `_atom_sites_alt` category.
    pub fn read_alt_locs(&mut self) -> Result<BTreeSet<String>, ReadError> {
        let codes = self.context.collect_column(FieldId::AtomSitesAlt, |row| {
            Ok(row.optional("id").map(String::from))
        })?;
        Ok(codes.into_iter().collect())
    }

    /// The atoms of a model. Water molecules are skipped.
    pub fn read_atom_lines(&mut self, model: i32) -> Result<AtomLineList, ReadError> {
        let mut atoms = AtomLineList::new();
        let Some(records) = self.context.records(FieldId::AtomSite) else {
            return Err(ReadError::at_document(FormatError::MissingBlock(
                FieldId::AtomSite.name().to_owned(),
            )));
        };
        for row in records {
            let row = row?;
            if let Some(atom) = parse_cif_atom_line(&row, model)? {
                atoms.push(atom);
            }
        }
        debug!("Read {} atoms for model {model}.", atoms.len());
        Ok(atoms)
    }

    pub fn read_poly_seq(&mut self) -> Result<Vec<PolySeqLine>, ReadError> {
        self.context
            .collect_column(FieldId::PolySeqScheme, |row| parse_poly_seq_line(row).map(Some))
    }

    /// Helices and turns, then strands.
    pub fn read_sec_structure(&mut self) -> Result<Vec<SecStructureLine>, ReadError> {
        let mut elements = self
            .context
            .collect_column(FieldId::StructConf, parse_struct_conf_line)?;
        elements.extend(
            self.context
                .collect_column(FieldId::StructSheetRange, |row| {
                    parse_sheet_range_line(row).map(Some)
                })?,
        );
        Ok(elements)
    }
}

impl<R> StructureReader for CifReader<R>
where
    R: BufRead + Seek,
{
    fn pdb_code(&mut self) -> Result<Option<String>, ReadError> {
        let codes = self.context.collect_column(FieldId::Entry, |row| {
            Ok(row.optional("id").map(str::to_lowercase))
        })?;
        Ok(codes.into_iter().next())
    }

    fn chains(&mut self) -> Result<Vec<String>, ReadError> {
        let chains = if self.context.registry().contains(FieldId::PolySeqScheme) {
            self.context.collect_column(FieldId::PolySeqScheme, |row| {
                Ok(row.optional("pdb_strand_id").map(String::from))
            })?
        } else {
            self.context.collect_column(FieldId::AtomSite, |row| {
                Ok(row
                    .optional("auth_asym_id")
                    .or_else(|| row.optional("label_asym_id"))
                    .map(String::from))
            })?
        };
        let chains: BTreeSet<String> = chains.into_iter().collect();
        Ok(chains.into_iter().collect())
    }

    fn models(&mut self) -> Result<Vec<i32>, ReadError> {
        let models: BTreeSet<i32> = self
            .context
            .collect_column(FieldId::AtomSite, |row| {
                row.extract_optional_number("pdbx_PDB_model_num", FieldError::Model)
                    .map(|model| Some(model.unwrap_or(DEFAULT_MODEL)))
            })?
            .into_iter()
            .collect();
        Ok(models.into_iter().collect())
    }

    fn read_model(&mut self, model: i32) -> Result<ModelRecords, ReadError> {
        let pdb_code = self.pdb_code()?;
        let declared_alt_locs = self.read_alt_locs()?;
        let mut atoms = self.read_atom_lines(model)?;
        atoms.add_alt_locs(declared_alt_locs);
        Ok(ModelRecords {
            pdb_code,
            atoms,
            poly_seq: self.read_poly_seq()?,
            sec_structure: self.read_sec_structure()?,
            strategy: PartitionStrategy::Labelled,
        })
    }
}

fn parse_cif_atom_line(row: &Row, model: i32) -> Result<Option<AtomLine>, ReadError> {
    let group = row.extract_string("group_PDB")?;
    if group != "ATOM" && group != "HETATM" {
        return Ok(None);
    }
    let row_model = row
        .extract_optional_number("pdbx_PDB_model_num", FieldError::Model)?
        .unwrap_or(DEFAULT_MODEL);
    if row_model != model {
        return Ok(None);
    }
    let residue_type = match row.optional("label_comp_id") {
        Some(residue_type) => residue_type.to_owned(),
        None => row.extract_string("auth_comp_id")?,
    };
    if is_water(&residue_type) {
        return Ok(None);
    }

    let chain_code = row.extract_string("label_asym_id")?;
    let pdb_chain_code = row
        .optional("auth_asym_id")
        .map(String::from)
        .unwrap_or_else(|| chain_code.clone());
    let x: f64 = row.extract_number("Cartn_x", FieldError::Position)?;
    let y: f64 = row.extract_number("Cartn_y", FieldError::Position)?;
    let z: f64 = row.extract_number("Cartn_z", FieldError::Position)?;

    Ok(Some(AtomLine {
        serial: row.extract_number("id", FieldError::Serial)?,
        atom_name: row.extract_string("label_atom_id")?,
        alt_loc: row.optional("label_alt_id").unwrap_or(DEFAULT_ALT_LOC).to_owned(),
        residue_type,
        pdb_chain_code,
        chain_code: Some(chain_code),
        sequence_index: row
            .extract_optional_number("label_seq_id", FieldError::SequenceIdentifier)?,
        pdb_residue_number: row.extract_number("auth_seq_id", FieldError::ResidueIdentifier)?,
        insertion_code: row.extract_char("pdbx_PDB_ins_code"),
        position: [x, y, z],
        occupancy: row
            .extract_optional_number("occupancy", FieldError::Occupancy)?
            .unwrap_or(DEFAULT_OCCUPANCY),
        b_factor: row
            .extract_optional_number("B_iso_or_equiv", FieldError::BFactor)?
            .unwrap_or(DEFAULT_B_FACTOR),
        element: row.optional("type_symbol").map(String::from),
        is_het_atm: group == "HETATM",
        is_non_poly: false,
        out_of_poly_chain: false,
    }))
}

fn parse_poly_seq_line(row: &Row) -> Result<PolySeqLine, ReadError> {
    Ok(PolySeqLine {
        chain_code: Some(row.extract_string("asym_id")?),
        pdb_chain_code: row.extract_string("pdb_strand_id")?,
        sequence_index: row.extract_number("seq_id", FieldError::SequenceIdentifier)?,
        residue_type: row.extract_string("mon_id")?,
        pdb_residue_number: row
            .extract_optional_number("pdb_seq_num", FieldError::ResidueIdentifier)?,
        insertion_code: row.extract_char("pdb_ins_code"),
    })
}

/// Short identifier of a helix or a turn: `HELX_P12` becomes `H12`.
fn short_conf_id(id: &str) -> Option<String> {
    let first = id.chars().next()?;
    let (_, serial) = id.rsplit_once("_P")?;
    if serial.is_empty() || !serial.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{first}{serial}"))
}

fn parse_struct_conf_line(row: &Row) -> Result<Option<SecStructureLine>, ReadError> {
    let id = row.extract_string("id")?;
    let kind = if id.starts_with("HELX") {
        SecStructureKind::Helix
    } else if id.starts_with("TURN") {
        SecStructureKind::Turn
    } else {
        warn!("Ignoring secondary structure element with unknown id {id}.");
        return Ok(None);
    };
    let Some(short_id) = short_conf_id(&id) else {
        warn!("Ignoring secondary structure element with unknown id {id}.");
        return Ok(None);
    };
    Ok(Some(SecStructureLine {
        kind,
        id: short_id,
        chain_code: row.extract_string("beg_label_asym_id")?,
        begin: ResidueRef::Sequence(
            row.extract_number("beg_label_seq_id", FieldError::SequenceIdentifier)?,
        ),
        end: ResidueRef::Sequence(
            row.extract_number("end_label_seq_id", FieldError::SequenceIdentifier)?,
        ),
    }))
}

fn parse_sheet_range_line(row: &Row) -> Result<SecStructureLine, ReadError> {
    let sheet_id = row.extract_string("sheet_id")?;
    let strand_id = row.extract_string("id")?;
    Ok(SecStructureLine {
        kind: SecStructureKind::Strand,
        id: format!("S{sheet_id}{strand_id}"),
        chain_code: row.extract_string("beg_label_asym_id")?,
        begin: ResidueRef::Sequence(
            row.extract_number("beg_label_seq_id", FieldError::SequenceIdentifier)?,
        ),
        end: ResidueRef::Sequence(
            row.extract_number("end_label_seq_id", FieldError::SequenceIdentifier)?,
        ),
    })
}
