//! Composite index aggregation with a missing-data quorum.

use crate::data::table::{Column, SurveyTable, TableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Sum,
}

/// A composite score over named component columns.
///
/// For each respondent the aggregate is taken over the observed components and
/// nulled when more than `max_missing` components are missing. A component
/// whose column does not exist in the table counts as missing for everyone.
#[derive(Debug, Clone)]
pub struct CompositeIndex {
    pub name: &'static str,
    pub components: Vec<&'static str>,
    pub aggregation: Aggregation,
    pub max_missing: usize,
}

impl CompositeIndex {
    pub fn compute(&self, table: &SurveyTable) -> Result<Vec<Option<f64>>, TableError> {
        let mut columns: Vec<Option<&Column>> = Vec::with_capacity(self.components.len());
        for &component in &self.components {
            if table.has_field(component) {
                columns.push(Some(table.column(component)?));
            } else {
                log::warn!(
                    "Component '{}' of '{}' is absent; counting it as missing for every respondent.",
                    component,
                    self.name
                );
                columns.push(None);
            }
        }

        let scores = (0..table.n_rows())
            .map(|row| {
                let observed: Vec<f64> = columns
                    .iter()
                    .filter_map(|column| column.and_then(|c| c.numeric(row)))
                    .collect();
                let missing = columns.len() - observed.len();
                if missing > self.max_missing || observed.is_empty() {
                    return None;
                }
                let total: f64 = observed.iter().sum();
                Some(match self.aggregation {
                    Aggregation::Sum => total,
                    Aggregation::Mean => total / observed.len() as f64,
                })
            })
            .collect();
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> SurveyTable {
        SurveyTable::from_columns(vec![
            (
                "a".to_string(),
                Column::Numeric(vec![Some(1.0), None, None, Some(0.0)]),
            ),
            (
                "b".to_string(),
                Column::Numeric(vec![Some(1.0), Some(1.0), None, Some(0.0)]),
            ),
            (
                "c".to_string(),
                Column::Numeric(vec![Some(0.0), Some(0.0), Some(1.0), None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn mean_with_quorum_of_two_of_three() {
        let index = CompositeIndex {
            name: "mean_index",
            components: vec!["a", "b", "c"],
            aggregation: Aggregation::Mean,
            max_missing: 1,
        };
        let scores = index.compute(&components()).unwrap();
        assert_eq!(scores[0], Some(2.0 / 3.0));
        assert_eq!(scores[1], Some(0.5));
        assert_eq!(scores[2], None);
        assert_eq!(scores[3], Some(0.0));
    }

    #[test]
    fn sum_ignores_missing_within_tolerance() {
        let index = CompositeIndex {
            name: "sum_index",
            components: vec!["a", "b", "c"],
            aggregation: Aggregation::Sum,
            max_missing: 2,
        };
        let scores = index.compute(&components()).unwrap();
        assert_eq!(scores, vec![Some(2.0), Some(1.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn absent_component_counts_as_missing() {
        let index = CompositeIndex {
            name: "with_absent",
            components: vec!["a", "b", "c", "not_collected"],
            aggregation: Aggregation::Sum,
            max_missing: 1,
        };
        let scores = index.compute(&components()).unwrap();
        // Row 0 misses only the absent component; every other row misses two.
        assert_eq!(scores, vec![Some(2.0), None, None, None]);
    }
}
