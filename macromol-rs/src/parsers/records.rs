use crate::parsers::errors::{FieldError, FormatError, ReadError};
use crate::parsers::schema::FieldSchemaEntry;
use crate::parsers::tokenizer::CifCursor;
use log::trace;
use std::io::{BufRead, Seek};
use std::str::FromStr;

/// Values meaning "unknown" or "not applicable" in a mmCIF file.
fn is_null(value: &str) -> bool {
    value == "?" || value == "."
}

/// One record of a data category.
#[derive(Debug)]
pub struct Row<'a> {
    entry: &'a FieldSchemaEntry,
    values: Vec<String>,
    /// 1-based index of the record within its category.
    record: usize,
}

impl<'a> Row<'a> {
    pub fn record(&self) -> usize {
        self.record
    }

    fn error(&self, error: FormatError) -> ReadError {
        ReadError::at_record(error, self.entry.name(), self.record)
    }

    /// The raw value of a sub-field, or `None` if the category does not have it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entry
            .position(key)
            .and_then(|index| self.values.get(index))
            .map(String::as_str)
    }

    /// The value of a sub-field, or `None` if the sub-field is missing, unknown, or
    /// not applicable.
    pub fn optional(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !is_null(value))
    }

    pub fn extract_string(&self, key: &str) -> Result<String, ReadError> {
        self.get(key)
            .map(String::from)
            .ok_or_else(|| self.error(FormatError::MissingField(format!("{}.{key}", self.entry.name()))))
    }

    pub fn extract_number<N>(&self, key: &str, error: FieldError) -> Result<N, ReadError>
    where
        N: FromStr,
    {
        self.extract_string(key)?
            .parse::<N>()
            .map_err(|_| self.error(FormatError::FieldFormat(error)))
    }

    /// Parse a sub-field that may be missing or null.
    pub fn extract_optional_number<N>(
        &self,
        key: &str,
        error: FieldError,
    ) -> Result<Option<N>, ReadError>
    where
        N: FromStr,
    {
        self.optional(key)
            .map(|value| {
                value
                    .parse::<N>()
                    .map_err(|_| self.error(FormatError::FieldFormat(error)))
            })
            .transpose()
    }

    pub fn extract_char(&self, key: &str) -> Option<char> {
        self.optional(key).and_then(|value| value.chars().next())
    }
}

/// Iterates over the records of one category, reading them from the file on demand.
///
/// A new iterator starts again from the first record.
pub struct Records<'c, 'e, R> {
    cursor: &'c mut CifCursor<R>,
    entry: &'e FieldSchemaEntry,
    record: usize,
    started: bool,
    done: bool,
}

impl<'c, 'e, R> Records<'c, 'e, R>
where
    R: BufRead + Seek,
{
    pub fn new(cursor: &'c mut CifCursor<R>, entry: &'e FieldSchemaEntry) -> Self {
        Records {
            cursor,
            entry,
            record: 0,
            started: false,
            done: false,
        }
    }

    fn next_loop_row(&mut self) -> Result<Option<Vec<String>>, ReadError> {
        let Some(span) = self.entry.span.clone() else {
            return Ok(None);
        };
        if !self.started {
            self.cursor.seek(span.start)?;
            self.started = true;
        }
        if self.cursor.position() >= span.end {
            return Ok(None);
        }
        let expected = self.entry.sub_field_count();
        let values = self.cursor.tokenize_within(expected, span.end)?;
        if values.len() != expected {
            return Err(ReadError::at_record(
                FormatError::UnexpectedFieldNumber {
                    field: self.entry.name().to_owned(),
                    expected,
                    found: values.len(),
                },
                self.entry.name(),
                self.record + 1,
            ));
        }
        Ok(Some(values))
    }
}

impl<'c, 'e, R> Iterator for Records<'c, 'e, R>
where
    R: BufRead + Seek,
{
    type Item = Result<Row<'e>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let values = if self.entry.is_loop {
            match self.next_loop_row() {
                Ok(Some(values)) => values,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        } else {
            self.done = true;
            self.entry.values.clone()
        };
        self.record += 1;
        trace!("{} record {}: {:?}", self.entry.name(), self.record, values);
        Some(Ok(Row {
            entry: self.entry,
            values,
            record: self.record,
        }))
    }
}
