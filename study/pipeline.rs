//! # Study pipeline
//!
//! Load, derive, fit, report. Each stage consumes the previous stage's output
//! and nothing is shared between runs.

use crate::config::{ConfigError, StudyConfig};
use crate::data::io::{LoadError, load_survey_table, write_survey_table};
use crate::data::table::TableError;
use crate::derivation::{DataQualityNote, DerivationEngine, DerivationError};
use crate::report::{ReportError, ReportFiles, ReportInputs, write_reports};
use crate::survey::models::study_models;
use crate::survey::{RunnerError, run_models};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Derivation(#[from] DerivationError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub respondents: usize,
    pub derived_columns: usize,
    pub notes: Vec<DataQualityNote>,
    pub fitted: Vec<String>,
    pub skipped: Vec<String>,
    pub files: ReportFiles,
}

fn engine_for(config: &StudyConfig) -> DerivationEngine {
    DerivationEngine::new(config.allostatic_variant, config.outcomes.clone())
}

fn report_notes(notes: &[DataQualityNote]) {
    for note in notes {
        log::warn!("Row {} ({}): {}", note.row, note.field, note.message);
    }
}

pub fn run(config: &StudyConfig) -> Result<PipelineSummary, PipelineError> {
    config.validate()?;
    let separator = config.separator_byte()?;

    let raw = load_survey_table(&config.input, separator)?;
    let derivation = engine_for(config).derive(&raw)?;
    report_notes(&derivation.notes);
    let table = raw.append(&derivation.columns)?;

    let specs = study_models(&config.primary_outcome, &config.spline);
    let models = run_models(&table, &config.design, &specs, &config.fit)?;

    let inputs = ReportInputs {
        table: &table,
        derived: &derivation.columns,
        design: &config.design,
        primary_outcome: &config.primary_outcome,
        models: &models,
    };
    let files = write_reports(&config.output_dir, &inputs, separator)?;

    let summary = PipelineSummary {
        respondents: table.n_rows(),
        derived_columns: derivation.columns.n_columns(),
        notes: derivation.notes,
        fitted: models.fitted().map(|fit| fit.name.clone()).collect(),
        skipped: models.skipped().map(|(name, _)| name.to_string()).collect(),
        files,
    };
    log::info!(
        "Run complete: {} respondents, {} model(s) fitted, {} skipped.",
        summary.respondents,
        summary.fitted.len(),
        summary.skipped.len()
    );
    Ok(summary)
}

/// Runs the derivation engine alone and writes the derived columns.
pub fn derive_only(
    input: &Path,
    output: &Path,
    config: &StudyConfig,
) -> Result<Vec<DataQualityNote>, PipelineError> {
    config.validate()?;
    let separator = config.separator_byte()?;

    let raw = load_survey_table(input, separator)?;
    let derivation = engine_for(config).derive(&raw)?;
    report_notes(&derivation.notes);
    write_survey_table(&derivation.columns, output, separator)?;
    log::info!(
        "Wrote {} derived columns to '{}'.",
        derivation.columns.n_columns(),
        output.display()
    );
    Ok(derivation.notes)
}
