use std::io::BufRead;
use chrono::DateTime;
use tracing::warn;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{FieldValue, Record, Timestamp};
use crate::load::row_source::RowSource;

/// Column holding the metric value, always parsed as a float
pub const VALUE_COLUMN: &str = "value";

/// Timestamp given to every record when no timestamp column is configured
pub const DEFAULT_TIMESTAMP: Timestamp = 1;

/// Delimited text lines (CSV by default), one record per line.
///
/// Each line must have exactly one field per configured column; anything
/// else is malformed and skipped. `null` and empty fields are absent from
/// the record.
pub struct DelimitedRowSource<R: BufRead> {
    reader: R,
    columns: Vec<String>,
    dimensions: Vec<String>,
    timestamp_column: Option<String>,
    delimiter: char,
    line: String,
    line_number: u64,
    skipped: u64,
    exhausted: bool,
}

impl<R: BufRead> DelimitedRowSource<R> {
    pub fn new(reader: R, columns: &[&str], dimensions: &[&str]) -> Self {
        DelimitedRowSource {
            reader,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            timestamp_column: None,
            delimiter: ',',
            line: String::new(),
            line_number: 0,
            skipped: 0,
            exhausted: false,
        }
    }

    pub fn with_timestamp_column(mut self, column: &str) -> Self {
        self.timestamp_column = Some(column.to_string());
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn parse_line(&self, line: &str) -> Result<Record> {
        let fields: Vec<&str> = line.split(self.delimiter).collect();
        if fields.len() != self.columns.len() {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                format!("expected {} fields, found {}", self.columns.len(), fields.len()),
            ));
        }

        let mut record = Record::new(DEFAULT_TIMESTAMP, self.dimensions.clone());
        for (column, field) in self.columns.iter().zip(fields) {
            let field = field.trim();
            if field.is_empty() || field == "null" {
                continue;
            }
            if column == VALUE_COLUMN {
                let value: f64 = field.parse().map_err(|_| {
                    Error::new(ErrorKind::MalformedRecord, format!("value '{}' is not a number", field))
                })?;
                record.event.insert(column.clone(), FieldValue::Double(value));
            } else {
                record.event.insert(column.clone(), FieldValue::Text(field.to_string()));
            }
        }

        if let Some(column) = &self.timestamp_column {
            let raw = match record.raw(column) {
                Some(FieldValue::Text(raw)) => raw.as_str(),
                _ => return Err(Error::new(ErrorKind::MalformedRecord, format!("missing timestamp '{}'", column))),
            };
            record.timestamp = parse_timestamp(raw)?;
        }
        Ok(record)
    }
}

/// Epoch millis or an RFC 3339 date-time
fn parse_timestamp(raw: &str) -> Result<Timestamp> {
    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(millis);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| Error::new(ErrorKind::MalformedRecord, format!("bad timestamp '{}'", raw)))
}

impl<R: BufRead> RowSource for DelimitedRowSource<R> {
    fn next_record(&mut self) -> Option<Result<Record>> {
        // Malformed lines are skipped iteratively, however many there are
        while !self.exhausted {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.exhausted = true,
                Ok(_) => {
                    self.line_number += 1;
                    let line = self.line.trim_end_matches(['\n', '\r']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    match self.parse_line(line) {
                        Ok(record) => return Some(Ok(record)),
                        Err(e) => {
                            self.skipped += 1;
                            warn!(line = self.line_number, error = %e, "skipping malformed line");
                        }
                    }
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }

    fn skipped(&self) -> u64 {
        self.skipped
    }
}
