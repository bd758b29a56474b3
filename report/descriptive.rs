//! Weighted descriptive statistics of the derived variables.

use crate::data::table::{Column, SurveyTable, TableError};
use itertools::Itertools;
use serde::Serialize;

/// One row of the descriptive table. Numeric variables get one row; each
/// level of a label variable gets its own row holding weighted proportions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveRow {
    pub variable: String,
    pub level: String,
    pub n_observed: usize,
    pub n_missing: usize,
    pub weighted_mean: f64,
    pub mean_cases: f64,
    pub mean_non_cases: f64,
}

#[derive(Default)]
struct WeightedMean {
    total: f64,
    weight: f64,
}

impl WeightedMean {
    fn add(&mut self, value: f64, weight: f64) {
        self.total += value * weight;
        self.weight += weight;
    }

    fn value(&self) -> f64 {
        if self.weight > 0.0 {
            self.total / self.weight
        } else {
            f64::NAN
        }
    }
}

/// Summarises `variables` with `weight` as the expansion factor, overall and
/// split by the 0/1 `outcome`. Respondents without a weight are counted but do
/// not enter the means.
pub fn describe(
    table: &SurveyTable,
    variables: &[&str],
    weight: &str,
    outcome: &str,
) -> Result<Vec<DescriptiveRow>, TableError> {
    let weights: Vec<f64> = {
        let column = table.column(weight)?;
        (0..table.n_rows())
            .map(|row| column.numeric(row).unwrap_or(0.0))
            .collect()
    };
    let status: Vec<Option<f64>> = {
        let column = table.column(outcome)?;
        (0..table.n_rows()).map(|row| column.numeric(row)).collect()
    };

    let mut rows = Vec::new();
    for &variable in variables {
        let column = table.column(variable)?;
        let n_missing = column.null_count();
        let n_observed = column.len() - n_missing;

        let levels: Vec<(String, Vec<Option<f64>>)> = match column {
            Column::Numeric(values) => vec![(String::new(), values.clone())],
            Column::Text(_) => {
                let labels: Vec<Option<String>> =
                    (0..table.n_rows()).map(|row| column.label(row)).collect();
                labels
                    .iter()
                    .flatten()
                    .unique()
                    .sorted_by(|a, b| natord::compare(a, b))
                    .map(|level| {
                        let indicator = labels
                            .iter()
                            .map(|l| l.as_ref().map(|l| if l == level { 1.0 } else { 0.0 }))
                            .collect();
                        (level.clone(), indicator)
                    })
                    .collect()
            }
        };

        for (level, values) in levels {
            let mut overall = WeightedMean::default();
            let mut cases = WeightedMean::default();
            let mut non_cases = WeightedMean::default();
            for (row, value) in values.iter().enumerate() {
                let Some(value) = *value else { continue };
                overall.add(value, weights[row]);
                match status[row] {
                    Some(s) if s == 1.0 => cases.add(value, weights[row]),
                    Some(s) if s == 0.0 => non_cases.add(value, weights[row]),
                    _ => {}
                }
            }
            rows.push(DescriptiveRow {
                variable: variable.to_string(),
                level,
                n_observed,
                n_missing,
                weighted_mean: overall.value(),
                mean_cases: cases.value(),
                mean_non_cases: non_cases.value(),
            });
        }
    }
    Ok(rows)
}
