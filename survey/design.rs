//! # Survey design binding
//!
//! Resolves the weight, stratum and cluster columns of a table into the
//! arrays the variance estimator needs. Binding happens once per model, since
//! models differ in which weight they use.

use crate::data::schema::design;
use crate::data::table::{Column, SurveyTable};
use ahash::AHashMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSpec {
    pub cluster: String,
    pub stratum: String,
    pub general_weight: String,
    pub dental_weight: String,
}

impl Default for DesignSpec {
    fn default() -> Self {
        Self {
            cluster: design::CLUSTER.to_string(),
            stratum: design::STRATUM.to_string(),
            general_weight: design::WEIGHT_GENERAL.to_string(),
            dental_weight: design::WEIGHT_DENTAL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightPreference {
    General,
    Dental,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    #[error("Design column '{column}' ({role}) does not exist in the table.")]
    ColumnMissing { role: &'static str, column: String },

    #[error("Weight column '{column}' has an invalid value {value} at row {row}; weights must be finite and non-negative.")]
    InvalidWeight { column: String, row: usize, value: f64 },

    #[error("Respondent at row {row} carries a positive weight but no {role} label.")]
    MissingLabel { role: &'static str, row: usize },

    #[error("Weight column '{0}' has no positive weight.")]
    NoPositiveWeight(String),
}

/// Design attributes resolved against one table.
///
/// Only respondents with a positive weight belong to a primary sampling unit;
/// PSUs are identified by their (stratum, cluster) label pair.
#[derive(Debug, Clone)]
pub struct BoundDesign {
    pub weight_column: String,
    pub weights: Array1<f64>,
    /// PSU index per respondent, `None` when the weight is zero.
    pub psu: Vec<Option<usize>>,
    /// Stratum index per PSU.
    pub psu_stratum: Vec<usize>,
    pub n_strata: usize,
}

impl BoundDesign {
    pub fn n_psu(&self) -> usize {
        self.psu_stratum.len()
    }

    /// Number of PSUs in each stratum.
    pub fn psu_per_stratum(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_strata];
        for &stratum in &self.psu_stratum {
            counts[stratum] += 1;
        }
        counts
    }

    pub fn weighted_total(&self) -> f64 {
        self.weights.sum()
    }
}

fn require<'a>(
    table: &'a SurveyTable,
    role: &'static str,
    column: &str,
) -> Result<&'a Column, DesignError> {
    table.get(column).ok_or_else(|| DesignError::ColumnMissing {
        role,
        column: column.to_string(),
    })
}

impl DesignSpec {
    /// The weight column a preference resolves to in this table. A dental
    /// preference falls back to the general weight when the extract carries
    /// no dental weight.
    pub fn weight_column(&self, table: &SurveyTable, preference: WeightPreference) -> String {
        match preference {
            WeightPreference::General => self.general_weight.clone(),
            WeightPreference::Dental if table.has_field(&self.dental_weight) => {
                self.dental_weight.clone()
            }
            WeightPreference::Dental => {
                log::warn!(
                    "Dental weight '{}' is absent; falling back to general weight '{}'.",
                    self.dental_weight,
                    self.general_weight
                );
                self.general_weight.clone()
            }
        }
    }

    pub fn bind(
        &self,
        table: &SurveyTable,
        preference: WeightPreference,
    ) -> Result<BoundDesign, DesignError> {
        let weight_column = self.weight_column(table, preference);
        let weight = require(table, "weight", &weight_column)?;
        let stratum = require(table, "stratum", &self.stratum)?;
        let cluster = require(table, "cluster", &self.cluster)?;

        let n_rows = table.n_rows();
        let mut weights = Array1::zeros(n_rows);
        for row in 0..n_rows {
            match weight.numeric(row) {
                None => {}
                Some(w) if w.is_finite() && w >= 0.0 => weights[row] = w,
                Some(value) => {
                    return Err(DesignError::InvalidWeight {
                        column: weight_column,
                        row,
                        value,
                    });
                }
            }
        }
        if !weights.iter().any(|&w| w > 0.0) {
            return Err(DesignError::NoPositiveWeight(weight_column));
        }

        let mut stratum_index: AHashMap<String, usize> = AHashMap::new();
        let mut psu_index: AHashMap<(usize, String), usize> = AHashMap::new();
        let mut psu_stratum = Vec::new();
        let mut psu = vec![None; n_rows];

        for row in 0..n_rows {
            if weights[row] <= 0.0 {
                continue;
            }
            let stratum_label = stratum
                .label(row)
                .ok_or(DesignError::MissingLabel { role: "stratum", row })?;
            let cluster_label = cluster
                .label(row)
                .ok_or(DesignError::MissingLabel { role: "cluster", row })?;

            let next_stratum = stratum_index.len();
            let h = *stratum_index.entry(stratum_label).or_insert(next_stratum);
            let next_psu = psu_index.len();
            let k = *psu_index.entry((h, cluster_label)).or_insert_with(|| {
                psu_stratum.push(h);
                next_psu
            });
            psu[row] = Some(k);
        }

        let bound = BoundDesign {
            weight_column,
            weights,
            psu,
            psu_stratum,
            n_strata: stratum_index.len(),
        };
        let single_psu = bound.psu_per_stratum().iter().filter(|&&n| n < 2).count();
        log::info!(
            "Bound design on '{}': {} strata ({} with a single PSU), {} PSUs, weighted total {:.1}.",
            bound.weight_column,
            bound.n_strata,
            single_psu,
            bound.n_psu(),
            bound.weighted_total()
        );
        Ok(bound)
    }
}
