//! In-memory, row-oriented dataset table with CSV load and serialization.
//!
//! Cells keep their original text unless a column is explicitly retyped, so
//! untouched columns round-trip byte-for-byte through load and write.

use chrono::{NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{CleaningError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    DateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Text(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

impl Column {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnType::Text,
        }
    }
}

/// A data row plus the line it came from in the source file
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub line: u64,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from text cells; empty strings become missing values.
    /// Line numbers are assigned as if the rows followed a header line.
    pub fn from_text_rows(header: &[&str], rows: &[Vec<&str>]) -> Result<Self> {
        let columns = header.iter().map(|name| Column::text(*name)).collect();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, cells)| Row {
                line: i as u64 + 2,
                values: cells.iter().map(|c| text_cell(c)).collect(),
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CleaningError::Parse(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        if let Some(row) = rows.iter().find(|r| r.values.len() != columns.len()) {
            return Err(CleaningError::Parse(format!(
                "line {} has {} fields, header has {}",
                row.line,
                row.values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_csv_reader(BufReader::new(file))
    }

    /// Parse comma-delimited text with a mandatory header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(CleaningError::Parse("missing header row".to_string()));
        }
        let columns = headers.iter().map(Column::text).collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            rows.push(Row {
                line,
                values: record.iter().map(text_cell).collect(),
            });
        }

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| CleaningError::MissingColumn(name.to_string()))
    }

    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r.values[idx]))
    }

    /// Keep only rows matching `keep`; columns are untouched.
    pub fn filter_rows<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&Row) -> bool,
    {
        let rows = self.rows.into_iter().filter(|r| keep(r)).collect();
        Self {
            columns: self.columns,
            rows,
        }
    }

    /// Replace every value of column `idx` and set its type to `kind`.
    pub fn retype_column<F>(self, idx: usize, kind: ColumnType, mut convert: F) -> Result<Self>
    where
        F: FnMut(u64, Value) -> Result<Value>,
    {
        let mut columns = self.columns;
        columns[idx].kind = kind;

        let mut rows = Vec::with_capacity(self.rows.len());
        for mut row in self.rows {
            let value = std::mem::replace(&mut row.values[idx], Value::Missing);
            row.values[idx] = convert(row.line, value)?;
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<u64> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(std::fs::metadata(path)?.len())
    }

    /// Write comma-delimited text with a header row and no index column.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let formats: Vec<&'static str> = (0..self.columns.len())
            .map(|idx| self.datetime_format(idx))
            .collect();

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows {
            let fields: Vec<String> = row
                .values
                .iter()
                .zip(&formats)
                .map(|(value, format)| match value {
                    Value::Missing => String::new(),
                    Value::Text(s) => s.clone(),
                    Value::DateTime(dt) => dt.format(format).to_string(),
                })
                .collect();
            csv_writer.write_record(&fields)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }

    // One format per column: date-only when every value sits at midnight,
    // sub-second precision only when some value needs it.
    fn datetime_format(&self, idx: usize) -> &'static str {
        let mut any_time = false;
        let mut any_fraction = false;
        for row in &self.rows {
            if let Value::DateTime(dt) = &row.values[idx] {
                if dt.nanosecond() != 0 {
                    any_fraction = true;
                }
                if dt.hour() != 0 || dt.minute() != 0 || dt.second() != 0 {
                    any_time = true;
                }
            }
        }
        if any_fraction {
            "%Y-%m-%d %H:%M:%S%.6f"
        } else if any_time {
            "%Y-%m-%d %H:%M:%S"
        } else {
            "%Y-%m-%d"
        }
    }
}

fn text_cell(raw: &str) -> Value {
    if raw.is_empty() {
        Value::Missing
    } else {
        Value::Text(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = "id,name,price,last_review\n\
                          1,\"Cozy, quiet room\",80,2019-05-01\n\
                          2,Loft,5,\n";

    #[test]
    fn test_load_csv_keeps_text_and_marks_missing() {
        let table = Table::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.column_names(), vec!["id", "name", "price", "last_review"]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows()[0].values[1].as_text(), Some("Cozy, quiet room"));
        assert!(table.rows()[1].values[3].is_missing());
        assert_eq!(table.rows()[0].line, 2);
        assert_eq!(table.rows()[1].line, 3);
    }

    #[test]
    fn test_untouched_table_round_trips() {
        let table = Table::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let out = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(out, SAMPLE);
    }

    #[test]
    fn test_ragged_rows_are_parse_errors() {
        let err = Table::from_csv_reader("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_empty_input_has_no_header() {
        let err = Table::from_csv_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, CleaningError::Parse(_)));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = Table::from_csv_reader("a,a\n1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CleaningError::Parse(_)));
    }

    #[test]
    fn test_header_only_table_writes_header() {
        let table = Table::from_csv_reader("id,price\n".as_bytes()).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.to_csv_bytes().unwrap(), b"id,price\n");
    }

    #[test]
    fn test_datetime_rendering_is_column_uniform() {
        let table = Table::from_text_rows(&["d"], &[vec!["a"], vec!["b"]]).unwrap();
        let midnight = NaiveDate::from_ymd_opt(2019, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let evening = NaiveDate::from_ymd_opt(2019, 6, 1)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();

        let dated = table
            .clone()
            .retype_column(0, ColumnType::DateTime, |_, _| Ok(Value::DateTime(midnight)))
            .unwrap();
        assert_eq!(dated.to_csv_bytes().unwrap(), b"d\n2019-05-01\n2019-05-01\n");

        let mut first = true;
        let mixed = table
            .retype_column(0, ColumnType::DateTime, |_, _| {
                let dt = if first { midnight } else { evening };
                first = false;
                Ok(Value::DateTime(dt))
            })
            .unwrap();
        assert_eq!(mixed.columns()[0].kind, ColumnType::DateTime);
        assert_eq!(
            mixed.to_csv_bytes().unwrap(),
            b"d\n2019-05-01 00:00:00\n2019-06-01 18:30:00\n"
        );
    }
}
