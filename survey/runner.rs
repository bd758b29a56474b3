//! # Model runner
//!
//! Fits every model of a set against one derived table. Each model binds the
//! design with its own weight preference, builds its frame and fits. A design
//! error aborts the run. A fit error aborts the run for a baseline model and
//! is recorded as a skipped check for a sensitivity model.

use crate::data::table::SurveyTable;
use crate::survey::basis::SplineBasis;
use crate::survey::design::{BoundDesign, DesignError, DesignSpec, WeightPreference};
use crate::survey::logistic::{FitError, FitOptions, LogisticFit, fit_survey_logistic};
use crate::survey::terms::{ModelFrame, Term};
use ndarray::{Array1, Array2, s};
use std::ops::Range;
use thiserror::Error;

/// Two-sided 95% standard normal quantile.
pub const Z_95: f64 = 1.959963984540054;
/// Points on the dose-response curve of a spline term.
pub const CURVE_POINTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Baseline,
    Sensitivity,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub outcome: String,
    /// Terms whose estimates the study reports.
    pub exposures: Vec<Term>,
    pub adjustments: Vec<Term>,
    pub weight: WeightPreference,
    /// Binary column that must equal 1 for a respondent to be analysed.
    pub subpopulation: Option<String>,
    pub role: ModelRole,
}

impl ModelSpec {
    pub fn terms(&self) -> Vec<Term> {
        self.exposures
            .iter()
            .chain(self.adjustments.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermEstimate {
    pub term: String,
    pub exposure: bool,
    pub estimate: f64,
    pub std_error: f64,
    pub z: f64,
    pub odds_ratio: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl TermEstimate {
    fn new(term: String, exposure: bool, estimate: f64, std_error: f64) -> Self {
        let z = if std_error > 0.0 { estimate / std_error } else { f64::NAN };
        Self {
            term,
            exposure,
            estimate,
            std_error,
            z,
            odds_ratio: estimate.exp(),
            ci_lower: (estimate - Z_95 * std_error).exp(),
            ci_upper: (estimate + Z_95 * std_error).exp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurvePoint {
    pub x: f64,
    pub log_odds: f64,
    pub odds_ratio: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Dose-response of a spline term relative to the smallest observed value.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineCurve {
    pub column: String,
    pub points: Vec<CurvePoint>,
}

#[derive(Debug, Clone)]
pub struct ModelFit {
    pub name: String,
    pub role: ModelRole,
    pub outcome: String,
    pub weight_column: String,
    pub n: usize,
    pub weighted_n: f64,
    pub iterations: usize,
    pub deviance: f64,
    pub estimates: Vec<TermEstimate>,
    pub curves: Vec<SplineCurve>,
}

impl ModelFit {
    pub fn estimate(&self, term: &str) -> Option<&TermEstimate> {
        self.estimates.iter().find(|e| e.term == term)
    }
}

#[derive(Debug, Clone)]
pub enum ModelOutcome {
    Fitted(ModelFit),
    Skipped { name: String, reason: String },
}

impl ModelOutcome {
    pub fn name(&self) -> &str {
        match self {
            ModelOutcome::Fitted(fit) => &fit.name,
            ModelOutcome::Skipped { name, .. } => name,
        }
    }
}

/// Results keyed by model name, in the order the models were given.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    pub outcomes: Vec<ModelOutcome>,
}

impl ModelSet {
    pub fn get(&self, name: &str) -> Option<&ModelOutcome> {
        self.outcomes.iter().find(|o| o.name() == name)
    }

    pub fn fitted(&self) -> impl Iterator<Item = &ModelFit> {
        self.outcomes.iter().filter_map(|o| match o {
            ModelOutcome::Fitted(fit) => Some(fit),
            ModelOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            ModelOutcome::Skipped { name, reason } => Some((name.as_str(), reason.as_str())),
            ModelOutcome::Fitted(_) => None,
        })
    }
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Model '{model}': {source}")]
    Design {
        model: String,
        #[source]
        source: DesignError,
    },

    #[error("Baseline model '{model}' failed: {source}")]
    BaselineFailed {
        model: String,
        #[source]
        source: FitError,
    },

    #[error("Model name '{0}' is used more than once.")]
    DuplicateModel(String),
}

pub fn run_models(
    table: &SurveyTable,
    design: &DesignSpec,
    models: &[ModelSpec],
    options: &FitOptions,
) -> Result<ModelSet, RunnerError> {
    let mut set = ModelSet::default();
    for spec in models {
        if set.get(&spec.name).is_some() {
            return Err(RunnerError::DuplicateModel(spec.name.clone()));
        }
        let bound = design
            .bind(table, spec.weight)
            .map_err(|source| RunnerError::Design {
                model: spec.name.clone(),
                source,
            })?;

        match fit_model(table, spec, &bound, options) {
            Ok(fit) => {
                log::info!(
                    "Model '{}' fitted on {} respondents in {} iterations.",
                    spec.name,
                    fit.n,
                    fit.iterations
                );
                set.outcomes.push(ModelOutcome::Fitted(fit));
            }
            Err(source) => match spec.role {
                ModelRole::Baseline => {
                    return Err(RunnerError::BaselineFailed {
                        model: spec.name.clone(),
                        source,
                    });
                }
                ModelRole::Sensitivity => {
                    log::warn!("Sensitivity check '{}' skipped: {}", spec.name, source);
                    set.outcomes.push(ModelOutcome::Skipped {
                        name: spec.name.clone(),
                        reason: source.to_string(),
                    });
                }
            },
        }
    }
    Ok(set)
}

pub fn fit_model(
    table: &SurveyTable,
    spec: &ModelSpec,
    design: &BoundDesign,
    options: &FitOptions,
) -> Result<ModelFit, FitError> {
    let terms = spec.terms();
    let frame = ModelFrame::build(
        table,
        &spec.outcome,
        &terms,
        spec.subpopulation.as_deref(),
        design.weights.view(),
    )?;
    let weights: Array1<f64> = frame.rows.iter().map(|&row| design.weights[row]).collect();

    let fit = fit_survey_logistic(
        frame.x.view(),
        frame.y.view(),
        weights.view(),
        &frame.rows,
        design,
        options,
    )?;

    let estimates = term_estimates(&frame, &fit, spec.exposures.len());
    let curves = frame
        .splines
        .iter()
        .map(|(block_index, basis)| {
            let block = &frame.blocks[*block_index];
            let column = block.term.columns()[0].to_string();
            spline_curve(column, basis, block.columns.clone(), &fit)
        })
        .collect();

    Ok(ModelFit {
        name: spec.name.clone(),
        role: spec.role,
        outcome: spec.outcome.clone(),
        weight_column: design.weight_column.clone(),
        n: frame.n_rows(),
        weighted_n: weights.sum(),
        iterations: fit.iterations,
        deviance: fit.deviance,
        estimates,
        curves,
    })
}

fn term_estimates(frame: &ModelFrame, fit: &LogisticFit, n_exposures: usize) -> Vec<TermEstimate> {
    let se = fit.standard_errors();
    let exposure_columns: Vec<usize> = frame
        .blocks
        .iter()
        .take(n_exposures)
        .flat_map(|block| block.columns.clone())
        .collect();

    frame
        .column_names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            TermEstimate::new(
                name.clone(),
                exposure_columns.contains(&j),
                fit.coefficients[j],
                se[j],
            )
        })
        .collect()
}

fn spline_curve(
    column: String,
    basis: &SplineBasis,
    columns: Range<usize>,
    fit: &LogisticFit,
) -> SplineCurve {
    let (lo, hi) = basis.range();
    let grid = Array1::linspace(lo, hi, CURVE_POINTS);
    let expanded = basis.evaluate(grid.view());
    let reference = expanded.row(0).to_owned();
    let contrasts: Array2<f64> = &expanded - &reference;

    let beta = fit.coefficients.slice(s![columns.clone()]).to_owned();
    let covariance = fit.covariance.slice(s![columns.clone(), columns]).to_owned();

    let points = grid
        .iter()
        .zip(contrasts.rows())
        .map(|(&x, contrast)| {
            let log_odds = contrast.dot(&beta);
            let variance = contrast.dot(&covariance.dot(&contrast)).max(0.0);
            let se = variance.sqrt();
            CurvePoint {
                x,
                log_odds,
                odds_ratio: log_odds.exp(),
                ci_lower: (log_odds - Z_95 * se).exp(),
                ci_upper: (log_odds + Z_95 * se).exp(),
            }
        })
        .collect();
    SplineCurve { column, points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Column;
    use approx::assert_abs_diff_eq;

    /// Two strata of four PSUs; the exposure raises the outcome probability.
    fn survey_table(n: usize) -> SurveyTable {
        let mut exposure = Vec::with_capacity(n);
        let mut outcome = Vec::with_capacity(n);
        let mut sex = Vec::with_capacity(n);
        let mut stratum = Vec::with_capacity(n);
        let mut cluster = Vec::with_capacity(n);
        let mut weight = Vec::with_capacity(n);
        let mut subsample = Vec::with_capacity(n);
        for i in 0..n {
            let x = (i % 11) as f64;
            let p = 1.0 / (1.0 + (-(-2.0 + 0.35 * x)).exp());
            let u = ((i * 53) % 97) as f64 / 97.0;
            exposure.push(Some(x));
            outcome.push(Some(if u < p { 1.0 } else { 0.0 }));
            sex.push(Some(if i % 2 == 0 { "male" } else { "female" }.to_string()));
            stratum.push(Some((i % 2) as f64 + 1.0));
            cluster.push(Some(((i / 2) % 4) as f64 + 1.0));
            weight.push(Some(1.0 + (i % 4) as f64 * 0.5));
            subsample.push(if i % 3 == 0 { None } else { Some(2.0) });
        }
        SurveyTable::from_columns(vec![
            ("exposure".to_string(), Column::Numeric(exposure)),
            ("outcome".to_string(), Column::Numeric(outcome)),
            ("sex_label".to_string(), Column::Text(sex)),
            ("stratum_id".to_string(), Column::Numeric(stratum)),
            ("cluster_id".to_string(), Column::Numeric(cluster)),
            ("weight_general".to_string(), Column::Numeric(weight)),
            ("weight_dental".to_string(), Column::Numeric(subsample)),
        ])
        .unwrap()
    }

    fn spec(name: &str, role: ModelRole, exposures: Vec<Term>) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            outcome: "outcome".to_string(),
            exposures,
            adjustments: vec![Term::categorical("sex_label")],
            weight: WeightPreference::General,
            subpopulation: None,
            role,
        }
    }

    #[test]
    fn fits_and_reports_odds_ratios() {
        let table = survey_table(300);
        let models = vec![spec("main", ModelRole::Baseline, vec![Term::continuous("exposure")])];
        let set = run_models(&table, &DesignSpec::default(), &models, &FitOptions::default()).unwrap();
        let ModelOutcome::Fitted(fit) = set.get("main").unwrap() else {
            panic!("main model was skipped");
        };
        assert_eq!(fit.n, 300);
        assert_eq!(fit.weight_column, "weight_general");
        let exposure = fit.estimate("exposure").unwrap();
        assert!(exposure.exposure);
        assert!(exposure.odds_ratio > 1.0);
        assert!(exposure.ci_lower < exposure.odds_ratio && exposure.odds_ratio < exposure.ci_upper);
        assert_abs_diff_eq!(exposure.odds_ratio, exposure.estimate.exp(), epsilon = 1e-12);
        assert!(!fit.estimate("sex_label[male]").unwrap().exposure);
        assert!(fit.curves.is_empty());
    }

    #[test]
    fn failing_sensitivity_model_is_skipped() {
        let table = survey_table(300);
        let models = vec![
            spec("main", ModelRole::Baseline, vec![Term::continuous("exposure")]),
            spec(
                "collinear",
                ModelRole::Sensitivity,
                vec![Term::continuous("exposure"), Term::continuous("exposure")],
            ),
        ];
        let set = run_models(&table, &DesignSpec::default(), &models, &FitOptions::default()).unwrap();
        assert_eq!(set.fitted().count(), 1);
        let skipped: Vec<(&str, &str)> = set.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "collinear");
        assert!(skipped[0].1.contains("ill-conditioned"));
    }

    #[test]
    fn failing_baseline_model_aborts() {
        let table = survey_table(300);
        let models = vec![spec("main", ModelRole::Baseline, vec![Term::continuous("exposure")])];
        let options = FitOptions {
            min_rows: 1000,
            ..FitOptions::default()
        };
        match run_models(&table, &DesignSpec::default(), &models, &options) {
            Err(RunnerError::BaselineFailed { model, source }) => {
                assert_eq!(model, "main");
                assert!(matches!(source, FitError::TooFewRows { found: 300, .. }));
            }
            other => panic!("Expected BaselineFailed, got {other:?}"),
        }
    }

    #[test]
    fn absent_design_column_is_fatal() {
        let table = survey_table(100);
        let design = DesignSpec {
            stratum: "strata".to_string(),
            ..DesignSpec::default()
        };
        let models = vec![spec("main", ModelRole::Sensitivity, vec![Term::continuous("exposure")])];
        assert!(matches!(
            run_models(&table, &design, &models, &FitOptions::default()),
            Err(RunnerError::Design { .. })
        ));
    }

    #[test]
    fn spline_curve_starts_at_the_reference() {
        let table = survey_table(400);
        let models = vec![spec(
            "spline",
            ModelRole::Sensitivity,
            vec![Term::Spline {
                column: "exposure".to_string(),
                internal_knots: 2,
                degree: 3,
                strategy: crate::survey::basis::KnotStrategy::Uniform,
            }],
        )];
        let set = run_models(&table, &DesignSpec::default(), &models, &FitOptions::default()).unwrap();
        let fit = set.fitted().next().unwrap();
        let curve = &fit.curves[0];
        assert_eq!(curve.column, "exposure");
        assert_eq!(curve.points.len(), CURVE_POINTS);
        assert_abs_diff_eq!(curve.points[0].x, 0.0);
        assert_abs_diff_eq!(curve.points[0].odds_ratio, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.points[CURVE_POINTS - 1].x, 10.0, epsilon = 1e-12);
        assert!(curve.points.last().unwrap().odds_ratio > 1.0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let table = survey_table(100);
        let models = vec![
            spec("same", ModelRole::Sensitivity, vec![Term::continuous("exposure")]),
            spec("same", ModelRole::Sensitivity, vec![Term::continuous("exposure")]),
        ];
        assert!(matches!(
            run_models(&table, &DesignSpec::default(), &models, &FitOptions::default()),
            Err(RunnerError::DuplicateModel(_))
        ));
    }
}
