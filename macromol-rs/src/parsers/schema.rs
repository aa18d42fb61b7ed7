use crate::parsers::errors::{FormatError, Location, ReadError};
use crate::parsers::tokenizer::{tokenize_str, CifCursor};
use log::{debug, trace};
use std::collections::HashMap;
use std::io::{BufRead, Seek};
use std::ops::Range;

/// The data categories we know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Entry,
    AtomSitesAlt,
    AtomSite,
    PolySeqScheme,
    StructConf,
    StructSheetRange,
}

impl FieldId {
    pub const ALL: [FieldId; 6] = [
        FieldId::Entry,
        FieldId::AtomSitesAlt,
        FieldId::AtomSite,
        FieldId::PolySeqScheme,
        FieldId::StructConf,
        FieldId::StructSheetRange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldId::Entry => "_entry",
            FieldId::AtomSitesAlt => "_atom_sites_alt",
            FieldId::AtomSite => "_atom_site",
            FieldId::PolySeqScheme => "_pdbx_poly_seq_scheme",
            FieldId::StructConf => "_struct_conf",
            FieldId::StructSheetRange => "_struct_sheet_range",
        }
    }

    pub fn from_name(name: &str) -> Option<FieldId> {
        FieldId::ALL.into_iter().find(|field| field.name() == name)
    }
}

/// What we know about a data category after indexing the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchemaEntry {
    pub field: FieldId,
    pub sub_fields: Vec<String>,
    pub is_loop: bool,
    /// Values of a single value category, in the order of `sub_fields`.
    pub values: Vec<String>,
    /// Byte range of the data rows of a loop.
    pub span: Option<Range<u64>>,
}

impl FieldSchemaEntry {
    fn new(field: FieldId, is_loop: bool) -> Self {
        FieldSchemaEntry {
            field,
            sub_fields: Vec::new(),
            is_loop,
            values: Vec::new(),
            span: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.field.name()
    }

    pub fn sub_field_count(&self) -> usize {
        self.sub_fields.len()
    }

    /// Column of a sub-field.
    pub fn position(&self, sub_field: &str) -> Option<usize> {
        self.sub_fields.iter().position(|name| name == sub_field)
    }

    fn extend_span(&mut self, start: u64, end: u64) {
        match self.span {
            Some(ref mut span) => span.end = end,
            None => self.span = Some(start..end),
        }
    }
}

/// Index of the categories of a mmCIF file we are interested in.
#[derive(Debug, Default)]
pub struct FieldSchemaRegistry {
    entries: HashMap<FieldId, FieldSchemaEntry>,
}

impl FieldSchemaRegistry {
    /// Index the first data block of the document in a single pass.
    pub fn scan<R>(cursor: &mut CifCursor<R>) -> Result<Self, ReadError>
    where
        R: BufRead + Seek,
    {
        cursor.seek(0)?;
        let mut lineno = 1;
        match cursor.read_line()? {
            Some(header) if header.starts_with("data_") => {}
            _ => return Err(ReadError::FormatError(FormatError::NotACifFile, Location::Line(1))),
        }

        let mut entries: HashMap<FieldId, FieldSchemaEntry> = HashMap::new();
        // Counts the elements separated by comment lines.
        let mut element = 0;
        let mut loop_element: Option<usize> = None;
        let mut current: Option<FieldId> = None;
        let mut element_has_data = false;

        loop {
            let start = cursor.position();
            let Some(line) = cursor.read_line()? else { break };
            lineno += 1;
            let end = cursor.position();

            if line.starts_with('#') {
                element += 1;
                current = None;
                element_has_data = false;
                continue;
            }
            if line.starts_with("data_") {
                debug!("Only the first data block is read; stopping at line {lineno}.");
                break;
            }
            if line.starts_with("loop_") {
                // Files without comment separators start a new element with each loop.
                if element_has_data || current.is_some() {
                    element += 1;
                    current = None;
                    element_has_data = false;
                }
                loop_element = Some(element);
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('_') {
                if element_has_data {
                    element += 1;
                    element_has_data = false;
                }
                let is_loop = loop_element == Some(element);
                let (name, rest) = line
                    .split_once(|c: char| c.is_ascii_whitespace())
                    .unwrap_or((line.as_str(), ""));
                current = None;
                let Some((field_name, sub_field)) = name.split_once('.') else {
                    continue;
                };
                let Some(field) = FieldId::from_name(field_name) else {
                    continue;
                };
                let entry = entries
                    .entry(field)
                    .or_insert_with(|| FieldSchemaEntry::new(field, is_loop));
                entry.sub_fields.push(sub_field.to_owned());
                if !is_loop {
                    let value = if rest.trim().is_empty() {
                        // The value is on the following lines.
                        let mut value = cursor.tokenize(1)?;
                        value.pop().unwrap_or_default()
                    } else {
                        tokenize_str(rest, 1).pop().unwrap_or_default()
                    };
                    trace!("{name} = {value}");
                    entry.values.push(value);
                }
                current = Some(field);
                continue;
            }

            element_has_data = true;
            if let Some(field) = current {
                if let Some(entry) = entries.get_mut(&field) {
                    if entry.is_loop {
                        entry.extend_span(start, end);
                    }
                }
            }
        }

        for entry in entries.values() {
            debug!(
                "Indexed {} with {} sub-fields{}.",
                entry.name(),
                entry.sub_field_count(),
                if entry.is_loop { " (loop)" } else { "" }
            );
        }
        Ok(FieldSchemaRegistry { entries })
    }

    pub fn get(&self, field: FieldId) -> Option<&FieldSchemaEntry> {
        self.entries.get(&field)
    }

    pub fn contains(&self, field: FieldId) -> bool {
        self.entries.contains_key(&field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DOCUMENT: &str = "data_1ABC
#
_entry.id 1ABC
#
_struct.title
;A long
title
;
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.label_atom_id
ATOM 1 N
ATOM 2 CA
#
loop_
_other.a
_other.b
x y
#
_atom_sites_alt.id
'A'
#
";

    fn scan(text: &str) -> Result<FieldSchemaRegistry, ReadError> {
        let mut cursor = CifCursor::new(Cursor::new(text.as_bytes().to_vec()));
        FieldSchemaRegistry::scan(&mut cursor)
    }

    #[test]
    fn test_single_value_fields() {
        let registry = scan(DOCUMENT).unwrap();
        let entry = registry.get(FieldId::Entry).unwrap();
        assert!(!entry.is_loop);
        assert_eq!(entry.sub_fields, vec!["id"]);
        assert_eq!(entry.values, vec!["1ABC"]);
        assert_eq!(entry.span, None);

        let alt = registry.get(FieldId::AtomSitesAlt).unwrap();
        assert_eq!(alt.values, vec!["A"]);
    }

    #[test]
    fn test_loop_span() {
        let registry = scan(DOCUMENT).unwrap();
        let entry = registry.get(FieldId::AtomSite).unwrap();
        assert!(entry.is_loop);
        assert_eq!(entry.sub_fields, vec!["group_PDB", "id", "label_atom_id"]);
        assert_eq!(entry.position("label_atom_id"), Some(2));
        let span = entry.span.clone().unwrap();
        assert_eq!(&DOCUMENT[span.start as usize..span.end as usize], "ATOM 1 N\nATOM 2 CA\n");
    }

    #[test]
    fn test_untracked_fields_are_skipped() {
        let registry = scan(DOCUMENT).unwrap();
        assert!(!registry.contains(FieldId::StructConf));
        assert!(FieldId::from_name("_other").is_none());
    }

    #[test]
    fn test_loops_without_separators() {
        let text = "data_x\nloop_\n_atom_site.id\n1\n2\nloop_\n_struct_conf.id\nHELX_P1\n";
        let registry = scan(text).unwrap();
        let atoms = registry.get(FieldId::AtomSite).unwrap().span.clone().unwrap();
        assert_eq!(&text[atoms.start as usize..atoms.end as usize], "1\n2\n");
        assert!(registry.get(FieldId::StructConf).unwrap().is_loop);
    }

    #[test]
    fn test_not_a_cif_file() {
        let error = scan("HEADER    PROTEIN\n").unwrap_err();
        assert_eq!(error.format_error(), Some(&FormatError::NotACifFile));
        assert!(scan("").is_err());
    }
}
