//! Numeric series behind the two figures.
//!
//! Figure 1 is a forest plot of exposure odds ratios across models; figure 2
//! the allostatic-load dose-response curve of the spline model.

use crate::survey::runner::ModelSet;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestRow {
    pub model: String,
    pub term: String,
    pub odds_ratio: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveRow {
    pub model: String,
    pub column: String,
    pub x: f64,
    pub log_odds: f64,
    pub odds_ratio: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

pub fn forest_rows(models: &ModelSet) -> Vec<ForestRow> {
    models
        .fitted()
        .flat_map(|fit| {
            fit.estimates
                .iter()
                .filter(|e| e.exposure && !e.term.starts_with("spline("))
                .map(move |e| ForestRow {
                    model: fit.name.clone(),
                    term: e.term.clone(),
                    odds_ratio: e.odds_ratio,
                    ci_lower: e.ci_lower,
                    ci_upper: e.ci_upper,
                    n: fit.n,
                })
        })
        .collect()
}

pub fn curve_rows(models: &ModelSet) -> Vec<CurveRow> {
    models
        .fitted()
        .flat_map(|fit| {
            fit.curves.iter().flat_map(move |curve| {
                curve.points.iter().map(move |p| CurveRow {
                    model: fit.name.clone(),
                    column: curve.column.clone(),
                    x: p.x,
                    log_odds: p.log_odds,
                    odds_ratio: p.odds_ratio,
                    ci_lower: p.ci_lower,
                    ci_upper: p.ci_upper,
                })
            })
        })
        .collect()
}
