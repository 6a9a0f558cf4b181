//! Tabular extraction results.

use std::fmt;
use std::io::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Flag(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// One output row; `None` cells are written as empty fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Option<Value>>,
}

impl Row {
    pub fn new(cells: Vec<Option<Value>>) -> Self {
        Self { cells }
    }

    /// Get a cell by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.cells.get(index).and_then(|c| c.as_ref())
    }

    /// Render every cell as CSV text.
    pub fn to_record(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|c| c.as_ref().map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }
}

/// Rows produced for one document under one format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Format identifier the rows were extracted with
    pub format: String,
    /// Column names, in order
    pub columns: Vec<String>,
    /// Rows in source order
    pub rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(format: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            format: format.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&Value>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.get(idx)).collect())
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.to_record())?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Render the table as a CSV string.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
