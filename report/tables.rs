//! Regression tables.

use crate::survey::runner::{ModelRole, ModelSet};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    pub model: String,
    pub role: &'static str,
    pub outcome: String,
    pub weight: String,
    pub term: String,
    pub exposure: bool,
    pub estimate: f64,
    pub std_error: f64,
    pub z: f64,
    pub odds_ratio: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub n: usize,
    pub weighted_n: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub model: String,
    pub reason: String,
}

pub fn role_label(role: ModelRole) -> &'static str {
    match role {
        ModelRole::Baseline => "baseline",
        ModelRole::Sensitivity => "sensitivity",
    }
}

/// One row per fitted model and term, models in run order.
pub fn coefficient_rows(models: &ModelSet) -> Vec<CoefficientRow> {
    models
        .fitted()
        .flat_map(|fit| {
            fit.estimates.iter().map(move |e| CoefficientRow {
                model: fit.name.clone(),
                role: role_label(fit.role),
                outcome: fit.outcome.clone(),
                weight: fit.weight_column.clone(),
                term: e.term.clone(),
                exposure: e.exposure,
                estimate: e.estimate,
                std_error: e.std_error,
                z: e.z,
                odds_ratio: e.odds_ratio,
                ci_lower: e.ci_lower,
                ci_upper: e.ci_upper,
                n: fit.n,
                weighted_n: fit.weighted_n,
            })
        })
        .collect()
}

pub fn skipped_rows(models: &ModelSet) -> Vec<SkippedRow> {
    models
        .skipped()
        .map(|(model, reason)| SkippedRow {
            model: model.to_string(),
            reason: reason.to_string(),
        })
        .collect()
}
