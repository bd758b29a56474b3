//! # In-memory survey table
//!
//! A column store keyed by the survey agency's field names. Rows are
//! respondents; every cell is optional because survey extracts are full of
//! skipped questions and unperformed lab tests.
//!
//! Two kinds of access exist and must not be confused:
//! - `has_field` checks the schema and never fails. It drives every fallback
//!   chain in the derivation engine.
//! - `column` reads a field and fails with `TableError::FieldNotFound` when the
//!   field is absent. A null cell inside an existing column is not an error.

use ahash::AHashMap;
use thiserror::Error;

/// A single column of respondent values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Field '{0}' does not exist in the loaded table. Check with `has_field` before reading optional fields.")]
    FieldNotFound(String),

    #[error("Field '{0}' already exists in the table.")]
    DuplicateField(String),

    #[error("Column '{field}' has {found} rows but the table has {expected}.")]
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            Column::Text(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// An all-null numeric column, used for derived fields whose sources are
    /// globally absent from the dataset.
    pub fn absent(n_rows: usize) -> Self {
        Column::Numeric(vec![None; n_rows])
    }

    /// Reads a cell as a number. Text cells are parsed as numeric codes.
    pub fn numeric(&self, row: usize) -> Option<f64> {
        match self {
            Column::Numeric(values) => values.get(row).copied().flatten(),
            Column::Text(values) => values
                .get(row)
                .and_then(|v| v.as_deref())
                .and_then(parse_numeric_code),
        }
    }

    /// Reads a cell as a label. Integral numbers render without a decimal point
    /// so that code `1.0` and text `"1"` produce the same label.
    pub fn label(&self, row: usize) -> Option<String> {
        match self {
            Column::Numeric(values) => values.get(row).copied().flatten().map(format_code),
            Column::Text(values) => values
                .get(row)
                .and_then(|v| v.as_deref())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Column::Numeric(_) => "numeric",
            Column::Text(_) => "text",
        }
    }
}

/// Parses a numeric-coded string as exported by statistical packages:
/// surrounding whitespace is ignored and a comma is accepted as the decimal
/// separator.
pub fn parse_numeric_code(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalised = trimmed.replace(',', ".");
    normalised.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn format_code(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Respondent table. Column order is preserved as loaded or appended.
#[derive(Debug, Clone, Default)]
pub struct SurveyTable {
    n_rows: usize,
    names: Vec<String>,
    columns: Vec<Column>,
    index: AHashMap<String, usize>,
}

impl SurveyTable {
    /// An empty table with a fixed row count, ready for `push_column`.
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            n_rows,
            ..Self::default()
        }
    }

    /// Builds a table from named columns. All columns must share one length.
    pub fn from_columns<I>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (String, Column)>,
    {
        let mut iter = columns.into_iter().peekable();
        let n_rows = iter.peek().map(|(_, c)| c.len()).unwrap_or(0);
        let mut table = Self::with_rows(n_rows);
        for (name, column) in iter {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Field existence check. Never fails.
    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| TableError::FieldNotFound(name.to_string()))
    }

    /// Returns the column when the field exists, `None` otherwise.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), TableError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(TableError::DuplicateField(name));
        }
        if column.len() != self.n_rows {
            return Err(TableError::LengthMismatch {
                field: name,
                expected: self.n_rows,
                found: column.len(),
            });
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Produces a new table holding this table's columns followed by `other`'s.
    /// Neither input is modified.
    pub fn append(&self, other: &SurveyTable) -> Result<SurveyTable, TableError> {
        if other.n_rows != self.n_rows && other.n_columns() > 0 {
            let field = other.names.first().cloned().unwrap_or_default();
            return Err(TableError::LengthMismatch {
                field,
                expected: self.n_rows,
                found: other.n_rows,
            });
        }
        let mut combined = self.clone();
        for (name, column) in other.iter() {
            combined.push_column(name, column.clone())?;
        }
        Ok(combined)
    }

    /// Produces a new table with only the requested fields, in the given order.
    pub fn select<'a, I>(&self, names: I) -> Result<SurveyTable, TableError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut selected = SurveyTable::with_rows(self.n_rows);
        for name in names {
            selected.push_column(name, self.column(name)?.clone())?;
        }
        Ok(selected)
    }
}
