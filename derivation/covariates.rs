//! Adjustment covariates shared by every model.

use crate::data::schema::{demography, derived, smoking, socioeconomic};
use crate::data::table::{Column, SurveyTable};
use crate::derivation::DerivationError;
use crate::derivation::codes::Sex;
use crate::derivation::resolve::{self, Source, SourceChain};

/// Education codes at or above this level count as higher education.
pub const HIGHER_EDUCATION_LEVEL: f64 = 4.0;

/// Lower bounds of the age bands, youngest first.
const AGE_BANDS: [(f64, &str); 4] = [(15.0, "15-24"), (25.0, "25-44"), (45.0, "45-64"), (65.0, "65+")];

pub fn age_band(age: Option<f64>) -> Option<&'static str> {
    let age = age?;
    AGE_BANDS
        .iter()
        .rev()
        .find(|(lower, _)| age >= *lower)
        .map(|(_, label)| *label)
}

fn zone_label(code: Option<f64>) -> Option<&'static str> {
    match code {
        Some(c) if c == 1.0 => Some("urban"),
        Some(c) if c == 2.0 => Some("rural"),
        _ => None,
    }
}

/// Daily and occasional smokers are current smokers; former and never are not.
fn smoking_status(columns: &[&Column], row: usize) -> Option<f64> {
    match resolve::value(columns, row) {
        Some(c) if c == 1.0 || c == 2.0 => Some(1.0),
        Some(c) if c == 3.0 || c == 4.0 => Some(0.0),
        _ => None,
    }
}

pub fn smoker_chain() -> SourceChain {
    SourceChain::new(
        derived::SMOKER,
        vec![
            Source::new(&[smoking::CURRENT], resolve::yes_no),
            Source::new(&[smoking::STATUS], smoking_status),
            Source::new(&[smoking::TOBACCO_USE], resolve::yes_no),
        ],
    )
}

fn labels(values: Vec<Option<&'static str>>) -> Column {
    Column::Text(values.into_iter().map(|v| v.map(str::to_string)).collect())
}

pub fn derive_covariates(raw: &SurveyTable) -> Result<SurveyTable, DerivationError> {
    let n_rows = raw.n_rows();
    let read = |field: &str| -> Vec<Option<f64>> {
        match raw.get(field) {
            Some(column) => (0..n_rows).map(|row| column.numeric(row)).collect(),
            None => {
                log::warn!("Covariate source '{field}' is absent; treating it as missing.");
                vec![None; n_rows]
            }
        }
    };

    let sex = read(demography::SEX);
    let age = read(demography::AGE);
    let zone = read(demography::ZONE);
    let education = read(socioeconomic::EDUCATION_LEVEL);

    let mut out = SurveyTable::with_rows(n_rows);
    out.push_column(
        derived::SEX_LABEL,
        labels(sex.iter().map(|c| Sex::from_code(*c).map(Sex::label)).collect()),
    )?;
    out.push_column(
        derived::AGE_BAND,
        labels(age.iter().map(|a| age_band(*a)).collect()),
    )?;
    out.push_column(
        derived::SMOKER,
        Column::Numeric(smoker_chain().evaluate(raw)?.values),
    )?;
    out.push_column(
        derived::HIGHER_EDUCATION,
        Column::Numeric(
            education
                .iter()
                .map(|e| e.map(|level| if level >= HIGHER_EDUCATION_LEVEL { 1.0 } else { 0.0 }))
                .collect(),
        ),
    )?;
    out.push_column(
        derived::ZONE_LABEL,
        labels(zone.iter().map(|z| zone_label(*z)).collect()),
    )?;
    Ok(out)
}
