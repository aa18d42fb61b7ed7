use crate::parsers::atom_lines::AtomLineList;
use crate::parsers::chains::PartitionStrategy;
use crate::parsers::errors::*;
use crate::parsers::line::*;
use crate::parsers::reader::{ModelRecords, StructureReader};
use components::is_water;
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

/// Reads PDB files, one line at a time.
pub struct PdbReader<R> {
    input: R,
}

impl PdbReader<BufReader<File>> {
    pub fn open<P>(path: P) -> Result<Self, ReadError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        Ok(PdbReader::new(BufReader::new(file)))
    }
}

impl<R> PdbReader<R>
where
    R: BufRead + Seek,
{
    pub fn new(input: R) -> Self {
        PdbReader { input }
    }

    /// Call `visit` with each line of the file and its 1-based number.
    ///
    /// Bytes that are not valid UTF-8 are replaced, so they surface as format
    /// errors on the fields that hold them.
    fn for_each_line<F>(&mut self, mut visit: F) -> Result<(), ReadError>
    where
        F: FnMut(usize, &str) -> Result<(), ReadError>,
    {
        self.input.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::new();
        let mut lineno = 0;
        loop {
            buffer.clear();
            if self.input.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            lineno += 1;
            if buffer.last() == Some(&b'\n') {
                buffer.pop();
            }
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
            visit(lineno, &String::from_utf8_lossy(&buffer))?;
        }
        Ok(())
    }
}

impl<R> StructureReader for PdbReader<R>
where
    R: BufRead + Seek,
{
    fn pdb_code(&mut self) -> Result<Option<String>, ReadError> {
        let mut pdb_code = None;
        self.for_each_line(|_, line| {
            if pdb_code.is_none() && line.starts_with("HEADER") {
                pdb_code = parse_header_line(line);
            }
            Ok(())
        })?;
        Ok(pdb_code)
    }

    fn chains(&mut self) -> Result<Vec<String>, ReadError> {
        let mut chains = BTreeSet::new();
        self.for_each_line(|_, line| {
            if is_atom_record(line) {
                if let Some(chain) = line.get(21..22) {
                    chains.insert(chain_code_from_column(chain));
                }
            }
            Ok(())
        })?;
        Ok(chains.into_iter().collect())
    }

    fn models(&mut self) -> Result<Vec<i32>, ReadError> {
        let mut models = BTreeSet::new();
        self.for_each_line(|lineno, line| {
            if line.starts_with("MODEL") {
                let model = parse_model_line(line)
                    .map_err(|e| ReadError::FormatError(e, Location::Line(lineno)))?;
                models.insert(model);
            }
            Ok(())
        })?;
        if models.is_empty() {
            models.insert(DEFAULT_MODEL);
        }
        Ok(models.into_iter().collect())
    }

    fn read_model(&mut self, model: i32) -> Result<ModelRecords, ReadError> {
        let mut state = PdbReadState::new(model);
        self.for_each_line(|lineno, line| {
            state
                .read_line(line)
                .map_err(|e| ReadError::FormatError(e, Location::Line(lineno)))
        })?;
        Ok(state.finish())
    }
}

/// What we track while reading a model from a PDB file.
struct PdbReadState {
    model: i32,
    current_model: i32,
    pdb_code: Option<String>,
    atoms: AtomLineList,
    out_of_poly_chain: bool,
    has_terminators: bool,
    poly_seq: Vec<PolySeqLine>,
    sec_structure: Vec<SecStructureLine>,
    helix_count: usize,
    turn_count: usize,
    strand_counts: HashMap<String, usize>,
}

impl PdbReadState {
    fn new(model: i32) -> Self {
        PdbReadState {
            model,
            // Files with a single model do not need MODEL records.
            current_model: DEFAULT_MODEL,
            pdb_code: None,
            atoms: AtomLineList::new(),
            out_of_poly_chain: false,
            has_terminators: false,
            poly_seq: Vec::new(),
            sec_structure: Vec::new(),
            helix_count: 0,
            turn_count: 0,
            strand_counts: HashMap::new(),
        }
    }

    fn read_line(&mut self, line: &str) -> Result<(), FormatError> {
        if line.starts_with("HEADER") {
            if self.pdb_code.is_none() {
                self.pdb_code = parse_header_line(line);
            }
        } else if line.starts_with("MODEL") {
            self.current_model = parse_model_line(line)?;
        } else if line.starts_with("SEQRES") {
            self.read_seqres_line(line)?;
        } else if line.starts_with("HELIX") {
            self.helix_count += 1;
            let element = parse_sec_structure_line(
                line,
                SecStructureKind::Helix,
                format!("H{}", self.helix_count),
                &HELIX_COLUMNS,
            )?;
            self.sec_structure.push(element);
        } else if line.starts_with("SHEET") {
            let sheet_id = column(line, 11..14)?.trim().to_owned();
            let count = self.strand_counts.entry(sheet_id.clone()).or_default();
            *count += 1;
            let element = parse_sec_structure_line(
                line,
                SecStructureKind::Strand,
                format!("S{sheet_id}{count}"),
                &SHEET_COLUMNS,
            )?;
            self.sec_structure.push(element);
        } else if line.starts_with("TURN") {
            self.turn_count += 1;
            let element = parse_sec_structure_line(
                line,
                SecStructureKind::Turn,
                format!("T{}", self.turn_count),
                &TURN_COLUMNS,
            )?;
            self.sec_structure.push(element);
        } else if self.current_model != self.model {
            // Atoms and TER records of other models.
        } else if line == "TER" || line.starts_with("TER ") {
            self.out_of_poly_chain = true;
            self.has_terminators = true;
        } else if is_atom_record(line) {
            let mut atom = parse_pdb_atom_line(line)?;
            if !atom.is_het_atm {
                self.out_of_poly_chain = false;
            }
            if is_water(&atom.residue_type) {
                return Ok(());
            }
            atom.out_of_poly_chain = self.out_of_poly_chain;
            self.atoms.push(atom);
        }
        Ok(())
    }

    fn read_seqres_line(&mut self, line: &str) -> Result<(), FormatError> {
        let pdb_chain_code = chain_code_from_column(column(line, 11..12)?);
        let mut sequence_index = self
            .poly_seq
            .iter()
            .filter(|residue| residue.pdb_chain_code == pdb_chain_code)
            .count() as isize;
        for start in (19..=67).step_by(4) {
            let Some(residue_type) = line.get(start..start + 3).map(str::trim) else {
                break;
            };
            if residue_type.is_empty() {
                continue;
            }
            sequence_index += 1;
            self.poly_seq.push(PolySeqLine {
                chain_code: None,
                pdb_chain_code: pdb_chain_code.clone(),
                sequence_index,
                residue_type: residue_type.to_owned(),
                pdb_residue_number: None,
                insertion_code: None,
            });
        }
        Ok(())
    }

    fn finish(mut self) -> ModelRecords {
        self.atoms.set_has_terminators(self.has_terminators);
        debug!(
            "Read {} atoms for model {}; TER records: {}.",
            self.atoms.len(),
            self.model,
            self.has_terminators
        );
        ModelRecords {
            pdb_code: self.pdb_code,
            strategy: PartitionStrategy::for_author_chains(self.atoms.has_terminators()),
            atoms: self.atoms,
            poly_seq: self.poly_seq,
            sec_structure: self.sec_structure,
        }
    }
}

/// Columns of the chain codes and residues delimiting a secondary structure element.
struct SecStructureColumns {
    begin_chain: Range<usize>,
    begin: Range<usize>,
    end_chain: Range<usize>,
    end: Range<usize>,
}

const HELIX_COLUMNS: SecStructureColumns = SecStructureColumns {
    begin_chain: 19..20,
    begin: 21..26,
    end_chain: 31..32,
    end: 33..38,
};

const SHEET_COLUMNS: SecStructureColumns = SecStructureColumns {
    begin_chain: 21..22,
    begin: 22..27,
    end_chain: 32..33,
    end: 33..38,
};

const TURN_COLUMNS: SecStructureColumns = SecStructureColumns {
    begin_chain: 19..20,
    begin: 20..25,
    end_chain: 30..31,
    end: 31..36,
};

fn is_atom_record(line: &str) -> bool {
    line.starts_with("ATOM") || line.starts_with("HETATM")
}

fn column(line: &str, range: Range<usize>) -> Result<&str, FormatError> {
    line.get(range).ok_or(FormatError::LineTooShort)
}

fn chain_code_from_column(chain: &str) -> String {
    let chain = chain.trim();
    if chain.is_empty() {
        NULL_CHAIN_CODE.to_owned()
    } else {
        chain.to_owned()
    }
}

fn parse_header_line(line: &str) -> Option<String> {
    let code = line.get(62..66)?;
    let mut chars = code.chars();
    let starts_with_digit = chars.next().map_or(false, |c| c.is_ascii_digit());
    if starts_with_digit && chars.all(|c| c.is_ascii_alphanumeric()) {
        Some(code.to_lowercase())
    } else {
        None
    }
}

fn parse_model_line(line: &str) -> Result<i32, FormatError> {
    line.get(10..14)
        .and_then(|serial| serial.trim().parse().ok())
        .or_else(|| line.split_whitespace().nth(1)?.parse().ok())
        .ok_or(FormatError::FieldFormat(FieldError::Model))
}

/// Residue number and insertion code, from a 5 character field.
fn parse_residue_ref(field: &str) -> Result<ResidueRef, FormatError> {
    let (number, insertion_code) = match field.char_indices().last() {
        Some((index, _)) => field.split_at(index),
        None => (field, ""),
    };
    let number = number
        .trim()
        .parse()
        .map_err(|_| FormatError::FieldFormat(FieldError::ResidueIdentifier))?;
    Ok(ResidueRef::Author {
        number,
        insertion_code: insertion_code.chars().next().filter(|c| *c != ' '),
    })
}

fn parse_sec_structure_line(
    line: &str,
    kind: SecStructureKind,
    id: String,
    columns: &SecStructureColumns,
) -> Result<SecStructureLine, FormatError> {
    let begin_chain = chain_code_from_column(column(line, columns.begin_chain.clone())?);
    let end_chain = chain_code_from_column(column(line, columns.end_chain.clone())?);
    if begin_chain != end_chain {
        return Err(FormatError::SecStructureChainMismatch {
            id,
            begin: begin_chain,
            end: end_chain,
        });
    }
    Ok(SecStructureLine {
        kind,
        id,
        chain_code: begin_chain,
        begin: parse_residue_ref(column(line, columns.begin.clone())?)?,
        end: parse_residue_ref(column(line, columns.end.clone())?)?,
    })
}

fn parse_optional_number(
    line: &str,
    range: Range<usize>,
    default: f64,
    error: FieldError,
) -> Result<f64, FormatError> {
    match line.get(range).map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| FormatError::FieldFormat(error)),
    }
}

fn parse_pdb_atom_line(line: &str) -> Result<AtomLine, FormatError> {
    if line.len() < 54 {
        // A line should be 80 columns. However, nothing after the positions is
        // required. Therefore, it is OK for a line to stop after the positions.
        return Err(FormatError::LineTooShort);
    }

    let serial = column(line, 6..11)?
        .trim()
        .parse()
        .map_err(|_| FormatError::FieldFormat(FieldError::Serial))?;
    let alt_loc = match column(line, 16..17)? {
        " " => DEFAULT_ALT_LOC.to_owned(),
        alt_loc => alt_loc.to_owned(),
    };
    let pdb_residue_number = column(line, 22..26)?
        .trim()
        .parse()
        .map_err(|_| FormatError::FieldFormat(FieldError::ResidueIdentifier))?;

    let x: Result<f64, _> = column(line, 30..38)?.trim().parse();
    let y: Result<f64, _> = column(line, 38..46)?.trim().parse();
    let z: Result<f64, _> = column(line, 46..54)?.trim().parse();
    let (Ok(x), Ok(y), Ok(z)) = (x, y, z) else {
        return Err(FormatError::FieldFormat(FieldError::Position));
    };

    Ok(AtomLine {
        serial,
        atom_name: column(line, 12..16)?.trim().to_owned(),
        alt_loc,
        residue_type: column(line, 17..20)?.trim().to_owned(),
        pdb_chain_code: chain_code_from_column(column(line, 21..22)?),
        chain_code: None,
        sequence_index: None,
        pdb_residue_number,
        insertion_code: column(line, 26..27)?.chars().next().filter(|c| *c != ' '),
        position: [x, y, z],
        occupancy: parse_optional_number(line, 54..60, DEFAULT_OCCUPANCY, FieldError::Occupancy)?,
        b_factor: parse_optional_number(line, 60..66, DEFAULT_B_FACTOR, FieldError::BFactor)?,
        element: line
            .get(76..78)
            .map(str::trim)
            .filter(|element| !element.is_empty())
            .map(String::from),
        is_het_atm: line.starts_with("HETATM"),
        is_non_poly: false,
        out_of_poly_chain: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_ressource;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    // Full line
    #[case("ATOM      1  N   GLY A   3      17.119   0.186  36.320  1.00 64.10           N  ")]
    // Truncated after the element symbol
    #[case("ATOM      1  N   GLY A   3      17.119   0.186  36.320  1.00 64.10           N")]
    fn test_parse_pdb_atom_line(#[case] line: &str) {
        let atom = parse_pdb_atom_line(line).unwrap();
        assert_eq!(atom.serial, 1);
        assert_eq!(atom.atom_name, "N");
        assert_eq!(atom.alt_loc, DEFAULT_ALT_LOC);
        assert_eq!(atom.residue_type, "GLY");
        assert_eq!(atom.pdb_chain_code, "A");
        assert_eq!(atom.pdb_residue_number, 3);
        assert_eq!(atom.insertion_code, None);
        assert_float_absolute_eq!(atom.position[0], 17.119);
        assert_float_absolute_eq!(atom.position[1], 0.186);
        assert_float_absolute_eq!(atom.position[2], 36.320);
        assert_float_absolute_eq!(atom.occupancy, 1.0);
        assert_float_absolute_eq!(atom.b_factor, 64.10);
        assert_eq!(atom.element.as_deref(), Some("N"));
        assert!(!atom.is_het_atm);
    }

    #[test]
    fn test_parse_short_atom_line() {
        let line = "HETATM 1234 ZN  B ZN   101A     14.001  16.234   9.876";
        let atom = parse_pdb_atom_line(line).unwrap();
        assert_eq!(atom.alt_loc, "B");
        assert_eq!(atom.pdb_chain_code, NULL_CHAIN_CODE);
        assert_eq!(atom.insertion_code, Some('A'));
        assert_eq!(atom.occupancy, DEFAULT_OCCUPANCY);
        assert_eq!(atom.b_factor, DEFAULT_B_FACTOR);
        assert_eq!(atom.element, None);
        assert!(atom.is_het_atm);
    }

    #[rstest]
    #[case("ATOM      1  N   GLY A   3      17.119   0.186", FormatError::LineTooShort)]
    #[case(
        "ATOM      X  N   GLY A   3      17.119   0.186  36.320",
        FormatError::FieldFormat(FieldError::Serial)
    )]
    #[case(
        "ATOM      1  N   GLY A   3      17.119   abcde  36.320",
        FormatError::FieldFormat(FieldError::Position)
    )]
    fn test_bad_atom_lines(#[case] line: &str, #[case] expected: FormatError) {
        assert_eq!(parse_pdb_atom_line(line).unwrap_err(), expected);
    }

    #[rstest]
    #[case("MODEL        2", 2)]
    #[case("MODEL     12", 12)]
    #[case("MODEL 3", 3)]
    fn test_parse_model_line(#[case] line: &str, #[case] expected: i32) {
        assert_eq!(parse_model_line(line).unwrap(), expected);
    }

    #[test]
    fn test_parse_header_line() {
        let line = "HEADER    OXIDOREDUCTASE                          12-JAN-01   1ABC              ";
        assert_eq!(parse_header_line(line).as_deref(), Some("1abc"));
        assert_eq!(parse_header_line("HEADER    NO CODE"), None);
    }

    #[test]
    fn test_sec_structure_lines() {
        let helix = "HELIX    1   1 GLY A    2  SER A    4  1                                   3";
        let element = parse_sec_structure_line(helix, SecStructureKind::Helix, String::from("H1"), &HELIX_COLUMNS).unwrap();
        assert_eq!(element.chain_code, "A");
        assert_eq!(element.begin, ResidueRef::Author { number: 2, insertion_code: None });
        assert_eq!(element.end, ResidueRef::Author { number: 4, insertion_code: None });

        let sheet = "SHEET    2   A 2 SER A   4A LYS A   5 -1";
        let element = parse_sec_structure_line(sheet, SecStructureKind::Strand, String::from("SA2"), &SHEET_COLUMNS).unwrap();
        assert_eq!(element.begin, ResidueRef::Author { number: 4, insertion_code: Some('A') });

        let turn = "TURN     1  T1 GLY A   2  SER B   4 ";
        let error = parse_sec_structure_line(turn, SecStructureKind::Turn, String::from("T1"), &TURN_COLUMNS).unwrap_err();
        assert!(matches!(error, FormatError::SecStructureChainMismatch { .. }));
    }

    const TWO_MODELS: &str = "\
SEQRES   1 A    2  GLY ALA
MODEL        1
ATOM      1  N   GLY A   1       1.000   1.000   1.000  1.00  0.00           N
ATOM      2  N   ALA A   2       2.000   2.000   2.000  1.00  0.00           N
TER       3      ALA A   2
HETATM    4  O   HOH A 101       3.000   3.000   3.000  1.00  0.00           O
ENDMDL
MODEL        2
ATOM      1  N   GLY A   1       1.500   1.500   1.500  1.00  0.00           N
ATOM      2  N   ALA A   2       2.500   2.500   2.500  1.00  0.00           N
ENDMDL
END
";

    #[test]
    fn test_models() {
        let mut reader = PdbReader::new(Cursor::new(TWO_MODELS.as_bytes().to_vec()));
        assert_eq!(reader.models().unwrap(), vec![1, 2]);
        assert_eq!(reader.chains().unwrap(), vec!["A"]);

        let first = reader.read_model(1).unwrap();
        assert_eq!(first.atoms.len(), 2);
        assert_eq!(first.strategy, PartitionStrategy::Terminated);
        assert_eq!(first.poly_seq.len(), 2);
        assert_eq!(first.poly_seq[1].sequence_index, 2);

        // The TER record of the first model does not count for the second one.
        let second = reader.read_model(2).unwrap();
        assert_eq!(second.atoms.len(), 2);
        assert_eq!(second.strategy, PartitionStrategy::Unterminated);
        assert_float_absolute_eq!(second.atoms.iter().next().unwrap().position[0], 1.5);

        assert!(reader.read_model(3).unwrap().atoms.is_empty());
    }

    #[test]
    fn test_error_line_number() {
        let text = "HEADER    TEST\nATOM      1  N   GLY A   1       1.000\n";
        let mut reader = PdbReader::new(Cursor::new(text.as_bytes().to_vec()));
        let error = reader.read_model(1).unwrap_err();
        assert!(matches!(
            error,
            ReadError::FormatError(FormatError::LineTooShort, Location::Line(2))
        ));
    }

    const VALID_ATOM: &str =
        "ATOM      1  N   GLY A   1       1.000   2.000   3.000  1.00 10.00           N  ";

    #[test]
    fn test_invalid_utf8_outside_fields() {
        let mut bytes = b"TITLE     CAF\xC9 PROTEIN\r\n".to_vec();
        bytes.extend_from_slice(VALID_ATOM.as_bytes());
        bytes.push(b'\n');
        let mut reader = PdbReader::new(Cursor::new(bytes));
        let records = reader.read_model(1).unwrap();
        assert_eq!(records.atoms.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_in_field() {
        let mut bytes = b"HEADER    TEST\n".to_vec();
        let mut atom = VALID_ATOM.as_bytes().to_vec();
        // Last digit of the serial number.
        atom[10] = 0xFF;
        bytes.extend_from_slice(&atom);
        let mut reader = PdbReader::new(Cursor::new(bytes));
        let error = reader.read_model(1).unwrap_err();
        assert!(matches!(error, ReadError::FormatError(_, Location::Line(2))));
    }

    #[test]
    fn test_file_with_ter() {
        let filepath = test_ressource!("2xyz_fragment.pdb");
        let mut reader = PdbReader::open(filepath).expect("Could not open test file.");
        assert_eq!(reader.pdb_code().unwrap().as_deref(), Some("2xyz"));
        let records = reader.read_model(1).unwrap();
        assert_eq!(records.strategy, PartitionStrategy::Terminated);
        let after_ter: Vec<bool> = records.atoms.iter().map(|atom| atom.out_of_poly_chain).collect();
        assert_eq!(after_ter.iter().filter(|out| **out).count(), 2);
        assert_eq!(records.sec_structure.len(), 3);
        assert_eq!(records.atoms.insertion_codes().get("A"), Some(&1));
    }
}
