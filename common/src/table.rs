use std::{fmt, io::Read, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// A single parsed csv cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Value {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Value::Missing;
        }
        if let Ok(number) = raw.parse::<f64>() {
            return Value::Number(number);
        }
        match raw {
            "true" | "True" | "TRUE" => Value::Bool(true),
            "false" | "False" | "FALSE" => Value::Bool(false),
            _ => Value::Text(raw.to_owned()),
        }
    }

    /// Empty cells read as `NaN`, like a dataframe would load them
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Missing => Some(f64::NAN),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Missing => Ok(()),
        }
    }
}

/// Ordered column names of a table
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Vec<String>);

impl Schema {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.0.iter().position(|c| c == column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

pub type Row = Vec<Value>;

/// Row-major table where every row carries exactly one value per schema column
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Parses csv with a header row. `source` is only used for error messages.
    pub fn from_csv_reader<R: Read>(reader: R, source: &Path) -> Result<Self, TableError> {
        let csv_error = |source_err| TableError::Csv {
            path: source.to_path_buf(),
            source: source_err,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers().map_err(csv_error)?.clone();
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(TableError::MissingHeader {
                path: source.to_path_buf(),
            });
        }

        let mut table = Table::new(Schema::new(headers.iter()));
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            table.rows.push(record.iter().map(Value::parse).collect());
        }
        Ok(table)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index_of(&self, column: &str) -> Result<usize, TableError> {
        self.schema
            .position(column)
            .ok_or_else(|| TableError::MissingColumn(column.to_owned()))
    }

    /// Sets `column` to `value` on every row. An existing column is overwritten in
    /// place, otherwise the column is appended at the end of the schema.
    pub fn set_constant_column(&mut self, column: &str, value: Value) {
        match self.schema.position(column) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.schema.0.push(column.to_owned());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    /// Moves all rows of `other` to the end of this table. Both schemas must match.
    pub fn append(&mut self, other: Table) {
        debug_assert_eq!(self.schema, other.schema);
        self.rows.extend(other.rows);
    }

    pub fn column(&self, column: &str) -> Result<impl Iterator<Item = &Value>, TableError> {
        let idx = self.index_of(column)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn numbers(&self, column: &str) -> Result<Vec<f64>, TableError> {
        self.column(column)?
            .enumerate()
            .map(|(row, value)| {
                value.as_f64().ok_or_else(|| TableError::NotNumeric {
                    column: column.to_owned(),
                    row,
                    value: value.to_string(),
                })
            })
            .collect()
    }

    pub fn bools(&self, column: &str) -> Result<Vec<bool>, TableError> {
        self.column(column)?
            .enumerate()
            .map(|(row, value)| {
                value.as_bool().ok_or_else(|| TableError::NotBoolean {
                    column: column.to_owned(),
                    row,
                    value: value.to_string(),
                })
            })
            .collect()
    }

    /// Rows for which `predicate` holds, in their current order
    pub fn filter<F>(&self, predicate: F) -> Table
    where
        F: Fn(&Row) -> bool,
    {
        Table {
            schema: self.schema.clone(),
            rows: self.rows.iter().filter(|row| predicate(*row)).cloned().collect(),
        }
    }

    /// Stable ascending sort on a numeric column
    pub fn sort_by_number(&mut self, column: &str) -> Result<(), TableError> {
        let keys = self.numbers(column)?;
        let mut keyed = keys.into_iter().zip(self.rows.drain(..)).collect::<Vec<_>>();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }
}
