//! # Prioritised source resolution
//!
//! Survey waves rename fields, move a lab value into a self-report string, or
//! split a total into two sub-counts. Every such case is expressed as a
//! [`SourceChain`]: an ordered list of sources, each naming the raw fields it
//! needs and a per-row transform over those fields.
//!
//! Resolution happens once per table, not per row. The first source whose
//! fields all exist wins for every respondent, even for respondents where the
//! winning source is null and a later source would have had a value.

use crate::data::table::{Column, SurveyTable, TableError};
use crate::derivation::codes;

/// Computes one respondent's value from the columns of a resolved source, in
/// the order the source listed its fields.
pub type RowTransform = fn(&[&Column], usize) -> Option<f64>;

#[derive(Debug, Clone)]
pub struct Source {
    pub fields: Vec<String>,
    pub transform: RowTransform,
}

impl Source {
    pub fn new(fields: &[&str], transform: RowTransform) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            transform,
        }
    }

    /// A source reading one field as a number.
    pub fn field(name: &str) -> Self {
        Self::new(&[name], value)
    }

    fn exists_in(&self, table: &SurveyTable) -> bool {
        self.fields.iter().all(|f| table.has_field(f))
    }
}

#[derive(Debug, Clone)]
pub struct SourceChain {
    name: String,
    sources: Vec<Source>,
}

/// The outcome of evaluating a chain against a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Fields of the winning source, or `None` when no source exists.
    pub chosen: Option<Vec<String>>,
    pub values: Vec<Option<f64>>,
}

impl Resolution {
    pub fn is_absent(&self) -> bool {
        self.chosen.is_none()
    }
}

impl SourceChain {
    pub fn new(name: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            name: name.into(),
            sources,
        }
    }

    /// A chain with a single one-field source.
    pub fn single(name: &str) -> Self {
        Self::new(name, vec![Source::field(name)])
    }

    /// Index of the first source whose fields all exist.
    pub fn resolve(&self, table: &SurveyTable) -> Option<usize> {
        self.sources.iter().position(|s| s.exists_in(table))
    }

    pub fn evaluate(&self, table: &SurveyTable) -> Result<Resolution, TableError> {
        let n_rows = table.n_rows();
        let Some(index) = self.resolve(table) else {
            log::info!(
                "No source available for '{}' (tried: {}); treating it as absent for all respondents.",
                self.name,
                self.candidates()
            );
            return Ok(Resolution {
                chosen: None,
                values: vec![None; n_rows],
            });
        };

        let source = &self.sources[index];
        let mut columns = Vec::with_capacity(source.fields.len());
        for field in &source.fields {
            columns.push(table.column(field)?);
        }
        if index > 0 {
            log::info!(
                "'{}' resolved to fallback source [{}].",
                self.name,
                source.fields.join(", ")
            );
        }

        let values = (0..n_rows)
            .map(|row| (source.transform)(&columns, row))
            .collect();
        Ok(Resolution {
            chosen: Some(source.fields.clone()),
            values,
        })
    }

    fn candidates(&self) -> String {
        self.sources
            .iter()
            .map(|s| format!("[{}]", s.fields.join(" + ")))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Reads the first column as a number.
pub fn value(columns: &[&Column], row: usize) -> Option<f64> {
    columns.first().and_then(|c| c.numeric(row))
}

/// Sums all columns; missing if any part is missing.
pub fn sum_all(columns: &[&Column], row: usize) -> Option<f64> {
    columns.iter().map(|c| c.numeric(row)).sum()
}

/// Reads the first column as a yes/no code and encodes it as 1/0.
pub fn yes_no(columns: &[&Column], row: usize) -> Option<f64> {
    codes::indicator(codes::yes_no(value(columns, row)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: Vec<(&str, Vec<Option<f64>>)>) -> SurveyTable {
        SurveyTable::from_columns(
            columns
                .into_iter()
                .map(|(name, values)| (name.to_string(), Column::Numeric(values))),
        )
        .unwrap()
    }

    fn teeth_chain() -> SourceChain {
        SourceChain::new(
            "teeth",
            vec![
                Source::field("adjusted"),
                Source::new(&["upper", "lower"], sum_all),
            ],
        )
    }

    #[test]
    fn preferred_source_wins_when_present() {
        let t = table(vec![
            ("adjusted", vec![Some(20.0), None]),
            ("upper", vec![Some(10.0), Some(10.0)]),
            ("lower", vec![Some(8.0), Some(8.0)]),
        ]);
        let resolution = teeth_chain().evaluate(&t).unwrap();
        assert_eq!(resolution.chosen, Some(vec!["adjusted".to_string()]));
        // The fallback never fills a null of the preferred source.
        assert_eq!(resolution.values, vec![Some(20.0), None]);
    }

    #[test]
    fn fallback_requires_all_its_fields() {
        let t = table(vec![
            ("upper", vec![Some(10.0), Some(12.0)]),
            ("lower", vec![Some(8.0), None]),
        ]);
        let resolution = teeth_chain().evaluate(&t).unwrap();
        assert_eq!(
            resolution.chosen,
            Some(vec!["upper".to_string(), "lower".to_string()])
        );
        assert_eq!(resolution.values, vec![Some(18.0), None]);

        let partial = table(vec![("upper", vec![Some(10.0)])]);
        let resolution = teeth_chain().evaluate(&partial).unwrap();
        assert!(resolution.is_absent());
        assert_eq!(resolution.values, vec![None]);
    }

    #[test]
    fn yes_no_transform_encodes_indicator() {
        let t = table(vec![("flag", vec![Some(1.0), Some(2.0), Some(8.0), None])]);
        let chain = SourceChain::new("flag", vec![Source::new(&["flag"], yes_no)]);
        let resolution = chain.evaluate(&t).unwrap();
        assert_eq!(resolution.values, vec![Some(1.0), Some(0.0), None, None]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let t = table(vec![
            ("adjusted", vec![Some(3.0)]),
            ("upper", vec![Some(1.0)]),
            ("lower", vec![Some(1.0)]),
        ]);
        let chain = teeth_chain();
        assert_eq!(chain.resolve(&t), Some(0));
        assert_eq!(chain.evaluate(&t).unwrap(), chain.evaluate(&t).unwrap());
    }
}
