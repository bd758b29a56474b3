//! # Survey Extract Loading
//!
//! This module is the only place that touches the raw extract on disk. It reads
//! a delimited text export of the survey table and turns it into a
//! [`SurveyTable`] without renaming or dropping anything.
//!
//! - Missing cells are expected. Unlike a model-ready matrix, a survey extract
//!   is mostly skipped questions, so nulls are preserved rather than rejected.
//! - Types are inferred by Polars over the whole file. Columns that Polars
//!   reads as text stay text; the derivation engine parses numeric codes on
//!   demand.
//! - Non-finite numbers are treated as missing.

use crate::data::schema::{self, DERIVED_FIELDS, FieldKind, LOGICAL_SCHEMA};
use crate::data::table::{Column, SurveyTable, TableError};
use polars::prelude::{
    Column as FrameColumn, CsvParseOptions, CsvReadOptions, CsvReader, CsvWriter, DataFrame,
    DataType, NamedFrom, PolarsError, SerReader, SerWriter, Series,
};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Table error: {0}")]
    TableError(#[from] TableError),
    #[error("The input file '{0}' contains no data rows.")]
    Empty(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "The input already contains the derived column '{0}'. Derived columns are computed from raw fields and cannot be supplied."
    )]
    DerivedColumnInInput(String),
}

/// Reads a delimited survey extract with a header row.
pub fn load_survey_table(path: &Path, separator: u8) -> Result<SurveyTable, LoadError> {
    log::info!("Loading survey extract from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(None)
                .with_parse_options(CsvParseOptions::default().with_separator(separator)),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(LoadError::Empty(path.display().to_string()));
    }

    let mut table = SurveyTable::with_rows(df.height());
    for frame_column in df.get_columns() {
        let name = frame_column.name().to_string();
        if DERIVED_FIELDS.contains(&name.as_str()) {
            return Err(LoadError::DerivedColumnInInput(name));
        }
        let column = convert_column(frame_column)?;
        table.push_column(name, column)?;
    }

    log::info!(
        "Loaded {} respondents and {} fields.",
        table.n_rows(),
        table.n_columns()
    );
    report_schema_coverage(&table);
    Ok(table)
}

/// Writes the table as a delimited file with a header row.
pub fn write_survey_table(table: &SurveyTable, path: &Path, separator: u8) -> Result<(), LoadError> {
    let columns: Vec<FrameColumn> = table
        .iter()
        .map(|(name, column)| {
            let series = match column {
                Column::Numeric(values) => Series::new(name.into(), values.as_slice()),
                Column::Text(values) => Series::new(name.into(), values.as_slice()),
            };
            FrameColumn::from(series)
        })
        .collect();

    let mut frame = DataFrame::new(columns)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(separator)
        .finish(&mut frame)?;
    log::info!("Wrote {} rows to '{}'", table.n_rows(), path.display());
    Ok(())
}

fn convert_column(frame_column: &FrameColumn) -> Result<Column, LoadError> {
    let series = frame_column.as_materialized_series();
    match series.dtype() {
        DataType::String => {
            let values = series
                .str()?
                .into_iter()
                .map(|value| value.map(str::to_string))
                .collect();
            Ok(Column::Text(values))
        }
        DataType::Null => Ok(Column::absent(series.len())),
        dtype => {
            let casted = series
                .cast(&DataType::Float64)
                .map_err(|_| LoadError::ColumnWrongType {
                    column_name: series.name().to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{dtype:?}"),
                })?;
            let values = casted
                .f64()?
                .into_iter()
                .map(|value| value.filter(|v| v.is_finite()))
                .collect();
            Ok(Column::Numeric(values))
        }
    }
}

/// Logs which known fields are present. Absent optional fields are normal for
/// some survey waves; absent core fields will null out whole indices.
fn report_schema_coverage(table: &SurveyTable) {
    let mut present = 0usize;
    for spec in LOGICAL_SCHEMA {
        if table.has_field(spec.name) {
            present += 1;
            continue;
        }
        if spec.optional {
            log::debug!(
                "Optional field '{}' ({}) not present in this extract.",
                spec.name,
                spec.kind.describe()
            );
        } else {
            log::warn!(
                "Core field '{}' ({}, {}) not present in this extract.",
                spec.name,
                spec.kind.describe(),
                spec.domain
            );
        }
    }
    let unknown = table
        .field_names()
        .filter(|name| schema::lookup(name).is_none())
        .count();
    log::info!(
        "{present} of {} known fields present; {unknown} additional fields carried through.",
        LOGICAL_SCHEMA.len()
    );
    for (name, column) in measurements_read_as_text(table) {
        log::warn!(
            "Measurement '{name}' was read as {}; non-numeric cells will be treated as missing.",
            column.kind()
        );
    }
}

/// Weights and continuous measurements that Polars could not read as numbers.
fn measurements_read_as_text(table: &SurveyTable) -> Vec<(&'static str, &Column)> {
    LOGICAL_SCHEMA
        .iter()
        .filter(|spec| matches!(spec.kind, FieldKind::Weight | FieldKind::Continuous))
        .filter_map(|spec| table.get(spec.name).map(|column| (spec.name, column)))
        .filter(|(_, column)| matches!(column, Column::Text(_)))
        .collect()
}
