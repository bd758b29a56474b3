//! # Reporting
//!
//! Writes every output of a run as a tab-separated file in one directory.

pub mod descriptive;
pub mod figures;
pub mod tables;

use crate::data::io::{LoadError, write_survey_table};
use crate::data::table::{SurveyTable, TableError};
use crate::survey::design::DesignSpec;
use crate::survey::runner::ModelSet;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DERIVED_FILE: &str = "derived.tsv";
pub const DESCRIPTIVES_FILE: &str = "descriptives.tsv";
pub const MODELS_FILE: &str = "models.tsv";
pub const SKIPPED_FILE: &str = "skipped.tsv";
pub const FOREST_FILE: &str = "figure_forest.tsv";
pub const SPLINE_FILE: &str = "figure_spline.tsv";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error while writing reports: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write a report row: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Failed to write the derived table: {0}")]
    Derived(#[from] LoadError),
}

/// What a run hands to the reporting stage.
pub struct ReportInputs<'a> {
    /// Raw table with the derived columns appended.
    pub table: &'a SurveyTable,
    /// The derived columns alone.
    pub derived: &'a SurveyTable,
    pub design: &'a DesignSpec,
    pub primary_outcome: &'a str,
    pub models: &'a ModelSet,
}

#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub derived: PathBuf,
    pub descriptives: PathBuf,
    pub models: PathBuf,
    pub skipped: PathBuf,
    pub forest: PathBuf,
    pub spline: PathBuf,
}

impl ReportFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            derived: dir.join(DERIVED_FILE),
            descriptives: dir.join(DESCRIPTIVES_FILE),
            models: dir.join(MODELS_FILE),
            skipped: dir.join(SKIPPED_FILE),
            forest: dir.join(FOREST_FILE),
            spline: dir.join(SPLINE_FILE),
        }
    }
}

/// Writes serialisable rows with a header line, tab-delimited. An empty row
/// set still produces the header.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Design columns followed by the derived columns, for audit.
pub fn audit_table(inputs: &ReportInputs) -> Result<SurveyTable, ReportError> {
    let design = inputs.design;
    let design_fields = [
        design.stratum.as_str(),
        design.cluster.as_str(),
        design.general_weight.as_str(),
        design.dental_weight.as_str(),
    ];
    let present = design_fields
        .into_iter()
        .filter(|f| inputs.table.has_field(f));
    Ok(inputs.table.select(present)?.append(inputs.derived)?)
}

pub fn write_reports(
    output_dir: &Path,
    inputs: &ReportInputs,
    separator: u8,
) -> Result<ReportFiles, ReportError> {
    fs::create_dir_all(output_dir)?;
    let files = ReportFiles::in_dir(output_dir);

    write_survey_table(&audit_table(inputs)?, &files.derived, separator)?;

    let variables: Vec<&str> = inputs.derived.field_names().collect();
    let descriptives = descriptive::describe(
        inputs.table,
        &variables,
        &inputs.design.general_weight,
        inputs.primary_outcome,
    )?;
    write_rows(
        &files.descriptives,
        &descriptives,
        &[
            "variable",
            "level",
            "n_observed",
            "n_missing",
            "weighted_mean",
            "mean_cases",
            "mean_non_cases",
        ],
    )?;

    write_rows(
        &files.models,
        &tables::coefficient_rows(inputs.models),
        &[
            "model",
            "role",
            "outcome",
            "weight",
            "term",
            "exposure",
            "estimate",
            "std_error",
            "z",
            "odds_ratio",
            "ci_lower",
            "ci_upper",
            "n",
            "weighted_n",
        ],
    )?;
    write_rows(
        &files.skipped,
        &tables::skipped_rows(inputs.models),
        &["model", "reason"],
    )?;
    write_rows(
        &files.forest,
        &figures::forest_rows(inputs.models),
        &["model", "term", "odds_ratio", "ci_lower", "ci_upper", "n"],
    )?;
    write_rows(
        &files.spline,
        &figures::curve_rows(inputs.models),
        &[
            "model",
            "column",
            "x",
            "log_odds",
            "odds_ratio",
            "ci_lower",
            "ci_upper",
        ],
    )?;

    log::info!("Reports written to '{}'.", output_dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Column;
    use crate::survey::runner::{
        CurvePoint, ModelFit, ModelOutcome, ModelRole, SplineCurve, TermEstimate,
    };

    fn estimate(term: &str, exposure: bool) -> TermEstimate {
        TermEstimate {
            term: term.to_string(),
            exposure,
            estimate: 0.5,
            std_error: 0.25,
            z: 2.0,
            odds_ratio: 0.5_f64.exp(),
            ci_lower: 1.0,
            ci_upper: 2.7,
        }
    }

    fn model_set() -> ModelSet {
        let fit = ModelFit {
            name: "physiological_spline".to_string(),
            role: ModelRole::Sensitivity,
            outcome: "cancer_any_site".to_string(),
            weight_column: "weight_general".to_string(),
            n: 40,
            weighted_n: 400.0,
            iterations: 5,
            deviance: 30.0,
            estimates: vec![
                estimate("(intercept)", false),
                estimate("spline(allostatic_load_score)[1]", true),
                estimate("age", false),
            ],
            curves: vec![SplineCurve {
                column: "allostatic_load_score".to_string(),
                points: vec![
                    CurvePoint {
                        x: 0.0,
                        log_odds: 0.0,
                        odds_ratio: 1.0,
                        ci_lower: 1.0,
                        ci_upper: 1.0,
                    },
                    CurvePoint {
                        x: 8.0,
                        log_odds: 0.7,
                        odds_ratio: 0.7_f64.exp(),
                        ci_lower: 1.1,
                        ci_upper: 3.0,
                    },
                ],
            }],
        };
        let oral = ModelFit {
            name: "oral".to_string(),
            role: ModelRole::Baseline,
            curves: Vec::new(),
            estimates: vec![estimate("(intercept)", false), estimate("missing_teeth", true)],
            ..fit.clone()
        };
        ModelSet {
            outcomes: vec![
                ModelOutcome::Fitted(oral),
                ModelOutcome::Fitted(fit),
                ModelOutcome::Skipped {
                    name: "oral_dentate".to_string(),
                    reason: "too few rows".to_string(),
                },
            ],
        }
    }

    #[test]
    fn forest_keeps_only_scalar_exposures() {
        let rows = figures::forest_rows(&model_set());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model, "oral");
        assert_eq!(rows[0].term, "missing_teeth");
    }

    #[test]
    fn coefficient_rows_cover_every_term() {
        let rows = tables::coefficient_rows(&model_set());
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].role, "baseline");
        assert_eq!(tables::skipped_rows(&model_set())[0].model, "oral_dentate");
    }

    #[test]
    fn writes_every_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let table = SurveyTable::from_columns(vec![
            ("stratum_id".to_string(), Column::Numeric(vec![Some(1.0), Some(2.0)])),
            ("weight_general".to_string(), Column::Numeric(vec![Some(1.0), Some(2.0)])),
            ("household_income".to_string(), Column::Numeric(vec![Some(5.0), Some(6.0)])),
            ("cancer_any_site".to_string(), Column::Numeric(vec![Some(1.0), Some(0.0)])),
            ("svi_score".to_string(), Column::Numeric(vec![Some(0.5), None])),
        ])
        .unwrap();
        let derived = table.select(["cancer_any_site", "svi_score"]).unwrap();
        let models = model_set();
        let inputs = ReportInputs {
            table: &table,
            derived: &derived,
            design: &DesignSpec::default(),
            primary_outcome: "cancer_any_site",
            models: &models,
        };
        let files = write_reports(dir.path(), &inputs, b'\t').unwrap();

        let audit = fs::read_to_string(&files.derived).unwrap();
        assert_eq!(
            audit.lines().next().unwrap(),
            "stratum_id\tweight_general\tcancer_any_site\tsvi_score"
        );

        let skipped = fs::read_to_string(&files.skipped).unwrap();
        assert_eq!(skipped, "model\treason\noral_dentate\ttoo few rows\n");

        let spline = fs::read_to_string(&files.spline).unwrap();
        assert_eq!(spline.lines().count(), 3);

        let descriptives = fs::read_to_string(&files.descriptives).unwrap();
        assert!(descriptives.lines().nth(2).unwrap().starts_with("svi_score\t\t1\t1\t0.5"));
    }
}
