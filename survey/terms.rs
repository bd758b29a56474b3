//! # Model terms and design-matrix construction
//!
//! A model frame keeps only the complete cases inside the analysis domain.
//! The intercept is always the first column; each term then contributes a
//! contiguous block of columns.

use crate::data::table::{Column, SurveyTable, TableError};
use crate::survey::basis::{BasisError, KnotStrategy, SplineBasis};
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1};
use std::ops::Range;
use thiserror::Error;

pub const INTERCEPT: &str = "(intercept)";

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Continuous(String),
    /// Dummy-coded against `reference`, or against the first level in
    /// natural order when no reference is given.
    Categorical {
        column: String,
        reference: Option<String>,
    },
    /// Product of two continuous columns.
    Interaction(String, String),
    Spline {
        column: String,
        internal_knots: usize,
        degree: usize,
        strategy: KnotStrategy,
    },
}

impl Term {
    pub fn continuous(column: &str) -> Self {
        Term::Continuous(column.to_string())
    }

    pub fn categorical(column: &str) -> Self {
        Term::Categorical {
            column: column.to_string(),
            reference: None,
        }
    }

    pub fn interaction(a: &str, b: &str) -> Self {
        Term::Interaction(a.to_string(), b.to_string())
    }

    /// Columns the term reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Term::Continuous(c) => vec![c.as_str()],
            Term::Categorical { column, .. } => vec![column.as_str()],
            Term::Interaction(a, b) => vec![a.as_str(), b.as_str()],
            Term::Spline { column, .. } => vec![column.as_str()],
        }
    }

    pub fn label(&self) -> String {
        match self {
            Term::Continuous(c) => c.clone(),
            Term::Categorical { column, .. } => column.clone(),
            Term::Interaction(a, b) => format!("{a}:{b}"),
            Term::Spline { column, .. } => format!("spline({column})"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Outcome '{column}' holds {value} at row {row}; a binary 0/1 outcome is required.")]
    NonBinaryOutcome { column: String, row: usize, value: f64 },

    #[error("Reference level '{reference}' of '{column}' is not observed among the analysed respondents.")]
    UnknownReference { column: String, reference: String },

    #[error("Categorical term '{0}' has fewer than two observed levels.")]
    SingleLevel(String),

    #[error("Spline term on '{column}' could not be built: {source}")]
    Spline {
        column: String,
        #[source]
        source: BasisError,
    },
}

/// A block of design-matrix columns belonging to one term.
#[derive(Debug, Clone)]
pub struct TermBlock {
    pub term: Term,
    pub columns: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct ModelFrame {
    /// Rows are the analysed respondents in table order.
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Table row of each analysed respondent.
    pub rows: Vec<usize>,
    pub column_names: Vec<String>,
    pub blocks: Vec<TermBlock>,
    /// The fitted basis of each spline term, keyed by block position.
    pub splines: Vec<(usize, SplineBasis)>,
}

impl ModelFrame {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Selects the complete cases and expands every term.
    ///
    /// A row is analysed when its weight is positive, its outcome is observed,
    /// its subpopulation indicator (if any) equals 1, and every column read by
    /// a term is observed.
    pub fn build(
        table: &SurveyTable,
        outcome: &str,
        terms: &[Term],
        subpopulation: Option<&str>,
        weights: ArrayView1<f64>,
    ) -> Result<Self, FrameError> {
        let outcome_column = table.column(outcome)?;
        let domain_column = subpopulation.map(|d| table.column(d)).transpose()?;
        let mut term_columns: Vec<&Column> = Vec::new();
        for term in terms {
            for name in term.columns() {
                term_columns.push(table.column(name)?);
            }
        }

        let mut rows = Vec::new();
        let mut y = Vec::new();
        for row in 0..table.n_rows() {
            if weights[row] <= 0.0 {
                continue;
            }
            if let Some(domain) = domain_column {
                if domain.numeric(row) != Some(1.0) {
                    continue;
                }
            }
            let Some(response) = outcome_column.numeric(row) else {
                continue;
            };
            let complete = term_columns.iter().all(|c| match c {
                Column::Numeric(_) => c.numeric(row).is_some(),
                Column::Text(_) => c.label(row).is_some(),
            });
            if !complete {
                continue;
            }
            if response != 0.0 && response != 1.0 {
                return Err(FrameError::NonBinaryOutcome {
                    column: outcome.to_string(),
                    row,
                    value: response,
                });
            }
            rows.push(row);
            y.push(response);
        }

        let mut blocks_data: Vec<Array2<f64>> = Vec::new();
        let mut column_names = vec![INTERCEPT.to_string()];
        let mut blocks = Vec::new();
        let mut splines = Vec::new();
        let mut next_column = 1;

        for term in terms {
            let (block, names) = match term {
                Term::Continuous(c) => {
                    let values = numeric_values(table.column(c)?, &rows);
                    (values.insert_axis(ndarray::Axis(1)), vec![c.clone()])
                }
                Term::Interaction(a, b) => {
                    let product =
                        numeric_values(table.column(a)?, &rows) * numeric_values(table.column(b)?, &rows);
                    (product.insert_axis(ndarray::Axis(1)), vec![term.label()])
                }
                Term::Categorical { column, reference } => {
                    categorical_block(table.column(column)?, column, reference.as_deref(), &rows)?
                }
                Term::Spline {
                    column,
                    internal_knots,
                    degree,
                    strategy,
                } => {
                    let values = numeric_values(table.column(column)?, &rows);
                    let (basis, expanded) =
                        SplineBasis::fit(values.view(), *internal_knots, *degree, *strategy)
                            .map_err(|source| FrameError::Spline {
                                column: column.clone(),
                                source,
                            })?;
                    let names = (1..=basis.n_columns())
                        .map(|k| format!("spline({column})[{k}]"))
                        .collect();
                    splines.push((blocks.len(), basis));
                    (expanded, names)
                }
            };
            let width = block.ncols();
            blocks.push(TermBlock {
                term: term.clone(),
                columns: next_column..next_column + width,
            });
            next_column += width;
            column_names.extend(names);
            blocks_data.push(block);
        }

        let mut x = Array2::zeros((rows.len(), next_column));
        x.column_mut(0).fill(1.0);
        for (block, data) in blocks.iter().zip(&blocks_data) {
            x.slice_mut(ndarray::s![.., block.columns.clone()]).assign(data);
        }

        Ok(Self {
            x,
            y: Array1::from_vec(y),
            rows,
            column_names,
            blocks,
            splines,
        })
    }
}

fn numeric_values(column: &Column, rows: &[usize]) -> Array1<f64> {
    rows.iter()
        .map(|&row| column.numeric(row).unwrap_or(f64::NAN))
        .collect()
}

fn categorical_block(
    column: &Column,
    name: &str,
    reference: Option<&str>,
    rows: &[usize],
) -> Result<(Array2<f64>, Vec<String>), FrameError> {
    let labels: Vec<String> = rows
        .iter()
        .map(|&row| column.label(row).unwrap_or_default())
        .collect();
    let levels: Vec<&str> = labels
        .iter()
        .map(String::as_str)
        .unique()
        .sorted_by(|a, b| natord::compare(a, b))
        .collect();
    if levels.len() < 2 {
        return Err(FrameError::SingleLevel(name.to_string()));
    }

    let reference = match reference {
        Some(r) if levels.contains(&r) => r,
        Some(r) => {
            return Err(FrameError::UnknownReference {
                column: name.to_string(),
                reference: r.to_string(),
            });
        }
        None => levels[0],
    };
    let contrasts: Vec<&str> = levels.into_iter().filter(|l| *l != reference).collect();

    let mut block = Array2::zeros((rows.len(), contrasts.len()));
    for (i, label) in labels.iter().enumerate() {
        if let Some(j) = contrasts.iter().position(|l| *l == label.as_str()) {
            block[[i, j]] = 1.0;
        }
    }
    let names = contrasts.iter().map(|l| format!("{name}[{l}]")).collect();
    Ok((block, names))
}
